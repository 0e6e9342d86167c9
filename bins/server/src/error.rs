#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("input line {line}: {detail}")]
    Input { line: usize, detail: String },

    #[error("{0}")]
    Writer(#[from] bulk_writer::WriterError),

    #[error("transport: {0}")]
    Transport(#[from] sink_api::TransportError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
