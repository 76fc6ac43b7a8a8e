//! xlsxserve - `data.xlsx`をJSON APIとして公開するサーバー
//!
//! 環境変数:
//!
//! * `PORT` - 待ち受けポート（既定値: 5000）
//! * `RUST_LOG` - ログフィルター（既定値: `info`）

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;
use xlsxserve::{ApiServer, ServiceBuilder, XlsxServeError};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server terminated");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), XlsxServeError> {
    let service = ServiceBuilder::from_env()?.build()?;
    ApiServer::bind(service).await?.run().await
}
