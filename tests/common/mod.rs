//! Common test utilities and helpers

/// FRE fixtures written the way the portal publishes them
pub mod test_data {
    use cvm_pay::api::TableKind;
    use cvm_pay::models::{Component, Config, FilingRecord};
    use std::path::Path;

    pub const ALFA: &str = "11111111000111";
    pub const BETA: &str = "22222222000122";
    pub const GAMA: &str = "33333333000133";

    const BODY_TOTALS: &str = "\
CNPJ_Companhia;Nome_Companhia;Data_Fim_Exercicio_Social;Versao;Orgao_Administracao;Quantidade_Membros_Remunerados;Salario;Beneficios_Diretos_Indiretos;Bonus;Participacao_Resultados;Cessacao_Cargo;Total_Remuneracao_Orgao
11.111.111/0001-11;Alfa S.A.;{Y}-12-31;1;Diretoria Estatutária;5;5000000;500000;2000000;1000000;0;8500000
11.111.111/0001-11;Alfa S.A.;{Y}-12-31;2;Diretoria Estatutária;5;5200000;500000;2000000;1000000;0;8700000
11.111.111/0001-11;Alfa S.A.;{Y}-12-31;2;Conselho de Administração;7;1400000;0;0;0;0;1400000
22.222.222/0001-22;Beta Energia S.A.;{Y}-12-31;1;Diretoria Estatutaria;4;3000000;300000;900000;0;400000;4600000
33.333.333/0001-33;Gama Varejo S.A.;{Y}-12-31;1;DIRETORIA;3;2400000;240000;600000;0;0;3240000
";

    const VARIABLE_PAY: &str = "\
CNPJ_Companhia;Nome_Companhia;Data_Fim_Exercicio_Social;Versao;Orgao_Administracao;Quantidade_Membros_Remunerados;Valor_Minimo_Bonus;Valor_Maximo_Bonus;Valor_Previsto_Metas_Atingidas_Bonus;Valor_Efetivo_Bonus
11.111.111/0001-11;Alfa S.A.;{Y}-12-31;2;Diretoria Estatutária;5;0;4000000;2500000;1800000
";

    const INDIVIDUAL_RANGE: &str = "\
CNPJ_Companhia;Nome_Companhia;Data_Fim_Exercicio_Social;Versao;Orgao_Administracao;Numero_Membros_Remunerados;Valor_Maior_Remuneracao;Valor_Medio_Remuneracao;Valor_Menor_Remuneracao
11.111.111/0001-11;Alfa S.A.;{Y}-12-31;2;Diretoria Estatutária;5;2500000;1740000;1200000
22.222.222/0001-22;Beta Energia S.A.;{Y}-12-31;1;Diretoria Estatutaria;4;1800000;1150000;800000
33.333.333/0001-33;Gama Varejo S.A.;{Y}-12-31;1;DIRETORIA;3;1000000;880000;700000
";

    pub const REGISTRY: &str = "\
CNPJ_CIA;DENOM_SOCIAL;SETOR_ATIV;UF;CONTROLE_ACIONARIO
11.111.111/0001-11;ALFA S.A.;Bancos;SP;Privado
22.222.222/0001-22;BETA ENERGIA S.A.;Energia Elétrica;RJ;Estatal
33.333.333/0001-33;GAMA VAREJO S.A.;Comércio;SP;Privado
";

    /// Portal file contents for one fiscal year
    pub fn fre_table(kind: TableKind, year: i32) -> String {
        let template = match kind {
            TableKind::BodyTotals => BODY_TOTALS,
            TableKind::VariablePay => VARIABLE_PAY,
            TableKind::IndividualRange => INDIVIDUAL_RANGE,
            TableKind::CompanyRegistry => REGISTRY,
        };
        template.replace("{Y}", &year.to_string())
    }

    /// Write the three yearly tables for `year` plus the registry into `dir`
    pub fn write_fre_fixture(dir: &Path, year: i32) {
        std::fs::create_dir_all(dir).unwrap();
        for kind in TableKind::YEARLY {
            std::fs::write(dir.join(kind.file_name(Some(year))), fre_table(kind, year)).unwrap();
        }
        std::fs::write(dir.join(TableKind::CompanyRegistry.file_name(None)), REGISTRY).unwrap();
    }

    /// Configuration pointing every path into `data_dir`
    pub fn test_config(data_dir: &Path, base_url: &str, years: Vec<i32>) -> Config {
        Config {
            base_url: base_url.to_string(),
            registry_url: format!("{}/cad_cia_aberta.csv", base_url.trim_end_matches('/')),
            data_dir: data_dir.to_path_buf(),
            merged_file: data_dir.join("dados_cvm_mesclados.csv"),
            years,
            companies: Vec::new(),
            delimiter: b';',
            request_delay_ms: 0,
            timeout_secs: 5,
        }
    }

    /// A merged record with only a paid amount
    pub fn create_test_record(company_id: &str, year: i32, body: &str, component: Component, paid: f64) -> FilingRecord {
        FilingRecord {
            company_id: company_id.to_string(),
            company_name: format!("CIA {}", company_id),
            year,
            body: body.to_string(),
            component,
            target: 0.0,
            paid,
            approved_max: 0.0,
            minimum: 0.0,
            members: 1.0,
            sector: "BANCOS".to_string(),
            state: "SP".to_string(),
            control: "PRIVADO".to_string(),
            filing_version: 1,
        }
    }
}

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            // Another test harness may already own the global subscriber
            let _ = tracing::subscriber::set_global_default(
                tracing_subscriber::fmt()
                    .with_env_filter("cvm_pay=debug,test=debug")
                    .with_test_writer()
                    .finish(),
            );
        });
    }

    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
