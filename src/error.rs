use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("failed to load configuration")]
    Config,
    #[display("failed to set up the archive loaders")]
    Loader,
    #[display("failed to open the position store")]
    Store,
    #[display("failed to listen on {_0}")]
    Bind(#[error(not(source))] String),
    #[display("server stopped unexpectedly")]
    Serve,
    #[display("invalid argument: {_0}")]
    Argument(#[error(not(source))] String),
    #[display("{_0}")]
    Inspect(#[error(not(source))] String),
}
