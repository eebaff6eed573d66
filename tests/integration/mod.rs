mod http_source;
mod refresh_pipeline;
