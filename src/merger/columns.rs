use std::collections::HashMap;

use super::normalize::header_key;
use crate::api::RawTable;
use crate::error::{PipelineError, PipelineResult};

/// Logical columns of the portal tables.
///
/// Each column lists the header names seen across CVM layouts, older portal releases and the
/// upper-case names of the legacy merged CSV. The first alias present wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Cnpj,
    CompanyName,
    Year,
    FiscalYearEnd,
    ReferenceDate,
    Version,
    Body,
    Members,
    VariableMembers,
    IndividualMembers,
    Salary,
    Benefits,
    Committees,
    OtherFixed,
    Bonus,
    ProfitSharing,
    Meetings,
    Commissions,
    OtherVariable,
    PostEmployment,
    Termination,
    ShareBased,
    ShareOptions,
    RestrictedShares,
    OtherSharePlans,
    ShareRecognized,
    BodyTotal,
    BonusMin,
    BonusMax,
    BonusTarget,
    BonusPaid,
    PlrMin,
    PlrMax,
    PlrTarget,
    PlrPaid,
    Highest,
    Average,
    Lowest,
    Sector,
    State,
    Control,
}

impl Column {
    pub fn name(&self) -> &'static str {
        self.aliases()[0]
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Cnpj => &["CNPJ_Companhia", "CNPJ_CIA", "CNPJ"],
            Column::CompanyName => &["Nome_Companhia", "DENOM_CIA", "DENOM_SOCIAL", "NOME_COMPANHIA"],
            Column::Year => &["Ano_Exercicio_Social", "Ano do Exercício Social", "ANO_REFER"],
            Column::FiscalYearEnd => &["Data_Fim_Exercicio_Social", "DT_FIM_EXERC"],
            Column::ReferenceDate => &["Data_Referencia", "DT_REFER"],
            Column::Version => &["Versao", "VERSAO"],
            Column::Body => &["Orgao_Administracao", "ORGAO_ADMINISTRACAO"],
            Column::Members => &[
                "Quantidade_Membros_Remunerados",
                "Numero_Membros_Remunerados",
                "QTD_MEMBROS_REMUNERADOS_TOTAL",
                "NUM_MEMBROS_TOTAL",
            ],
            Column::VariableMembers => &[
                "Quantidade_Membros_Remunerados",
                "QTD_MEMBROS_REMUNERADOS_VARIAVEL",
                "NUM_MEMBROS_BONUS_PLR",
            ],
            Column::IndividualMembers => &[
                "Numero_Membros_Remunerados",
                "Quantidade_Membros_Orgao_Remuneracao_Individual",
                "Numero_Membros",
                "NUM_MEMBROS_INDIVIDUAL",
            ],
            Column::Salary => &["Salario", "Valor_Fixo_Salario", "REM_FIXA_SALARIO"],
            Column::Benefits => &["Beneficios_Diretos_Indiretos", "REM_FIXA_BENEFICIOS"],
            Column::Committees => &["Participacoes_Comites", "Participacao_Comites", "REM_FIXA_COMITES"],
            Column::OtherFixed => &["Outros_Valores_Fixos", "REM_FIXA_OUTROS"],
            Column::Bonus => &["Bonus", "REM_VAR_BONUS"],
            Column::ProfitSharing => &["Participacao_Resultados", "REM_VAR_PLR"],
            Column::Meetings => &["Participacao_Reunioes", "REM_VAR_REUNIOES"],
            Column::Commissions => &["Comissoes", "REM_VAR_COMISSOES"],
            Column::OtherVariable => &["Outros_Valores_Variaveis", "REM_VAR_OUTROS"],
            Column::PostEmployment => &["Pos_Emprego", "REM_POS_EMPREGO"],
            Column::Termination => &["Cessacao_Cargo", "REM_CESSACAO_CARGO"],
            Column::ShareBased => &["Baseada_Acoes", "REM_ACOES_BLOCO3"],
            Column::ShareOptions => &[
                "Valor_Total_Opcoes_Acoes_Exercidas_Reconhecidas_Resultado_Exercicio",
                "VALOR_OPCOES_EXERCIDAS",
            ],
            Column::RestrictedShares => &[
                "Valor_Total_Acoes_Restritas_Entregues_Reconhecidas_Resultado_Exercicio",
                "VALOR_ACOES_RESTRITAS",
            ],
            Column::OtherSharePlans => &[
                "Valor_Total_Outros_Planos_Baseados_Acoes_Reconhecidos_Resultado_Exercicio",
                "VALOR_OUTROS_PLANOS_ACOES",
            ],
            Column::ShareRecognized => &[
                "Valor_Total_Remuneracao_Baseada_Acoes_Reconhecida_Resultado_Exercicio",
                "TOTAL_REM_ACOES_BLOCO1",
            ],
            Column::BodyTotal => &[
                "Total_Remuneracao_Orgao",
                "Valor_Total_Remuneracao_Orgao",
                "TOTAL_REMUNERACAO_ORGAO",
            ],
            Column::BonusMin => &["Valor_Minimo_Bonus", "Bonus_Valor_Minimo", "BONUS_MIN"],
            Column::BonusMax => &["Valor_Maximo_Bonus", "Bonus_Valor_Maximo", "BONUS_MAX"],
            Column::BonusTarget => &[
                "Valor_Previsto_Metas_Atingidas_Bonus",
                "Bonus_Valor_Metas_Atingidas",
                "BONUS_ALVO",
            ],
            Column::BonusPaid => &["Valor_Efetivo_Bonus", "Bonus_Valor_Efetivo", "BONUS_PAGO"],
            Column::PlrMin => &[
                "Valor_Minimo_Participacao",
                "Participacao_Valor_Minimo",
                "PLR_MIN",
            ],
            Column::PlrMax => &[
                "Valor_Maximo_Participacao",
                "Participacao_Valor_Maximo",
                "PLR_MAX",
            ],
            Column::PlrTarget => &[
                "Valor_Previsto_Metas_Atingidas_Participacao",
                "Participacao_Valor_Metas_Atingidas",
                "PLR_ALVO",
            ],
            Column::PlrPaid => &[
                "Valor_Efetivo_Participacao",
                "Participacao_Valor_Efetivo",
                "PLR_PAGO",
            ],
            Column::Highest => &[
                "Valor_Maior_Remuneracao",
                "Valor_Maior_Remuneracao_Individual_Reconhecida_Exercicio",
                "Valor_Maior_Remuneracao_Individual",
                "REM_MAXIMA_INDIVIDUAL",
            ],
            Column::Average => &[
                "Valor_Medio_Remuneracao",
                "Valor_Medio_Remuneracao_Individual_Reconhecida_Exercicio",
                "Valor_Medio_Remuneracao_Individual",
                "REM_MEDIA_INDIVIDUAL",
            ],
            Column::Lowest => &[
                "Valor_Menor_Remuneracao",
                "Valor_Menor_Remuneracao_Individual_Reconhecida_Exercicio",
                "Valor_Menor_Remuneracao_Individual",
                "REM_MINIMA_INDIVIDUAL",
            ],
            Column::Sector => &["SETOR_ATIV", "SETOR_ATIVIDADE", "Setor de Atividade", "SETOR_DE_ATIVDADE"],
            Column::State => &["UF_SEDE", "UF"],
            Column::Control => &["CONTROLE_ACIONARIO", "TP_CONTROLE"],
        }
    }
}

/// Header positions of the logical columns found in one table
#[derive(Debug, Clone)]
pub struct ColumnMap {
    table: String,
    positions: HashMap<Column, usize>,
}

impl ColumnMap {
    /// Resolve the given logical columns against the table header
    pub fn resolve(table: &RawTable, columns: &[Column]) -> Self {
        let keys: Vec<String> = table.headers.iter().map(|h| header_key(h)).collect();
        let mut positions = HashMap::new();
        for &column in columns {
            let found = column
                .aliases()
                .iter()
                .map(|alias| header_key(alias))
                .find_map(|alias| keys.iter().position(|key| *key == alias));
            if let Some(index) = found {
                positions.insert(column, index);
            }
        }
        Self {
            table: table.name(),
            positions,
        }
    }

    pub fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// Fail with `MalformedInput` unless the column was found
    pub fn require(&self, column: Column) -> PipelineResult<()> {
        if self.has(column) {
            Ok(())
        } else {
            Err(PipelineError::malformed(&self.table, column.name()))
        }
    }

    /// Fail with `MalformedInput` unless at least one of the columns was found
    pub fn require_any(&self, columns: &[Column]) -> PipelineResult<()> {
        if columns.iter().any(|c| self.has(*c)) {
            Ok(())
        } else {
            let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
            Err(PipelineError::malformed(&self.table, names.join(" | ")))
        }
    }

    /// Cell value for a logical column; empty when the column is absent
    pub fn get<'a>(&self, row: &'a [String], column: Column) -> &'a str {
        self.positions
            .get(&column)
            .and_then(|&index| row.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }
}
