//! Server Module
//!
//! tokioを使用したHTTP/1.1サーバー。
//! 接続ごとにタスクを生成し、1リクエストを処理して接続を閉じる。

mod http;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::builder::SheetService;
use crate::error::XlsxServeError;

pub(crate) use http::{error_response, route, Request, Response};

/// accept失敗後の待機時間
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 応答後に残りの入力を読み捨てる時間の上限
const LINGER_TIMEOUT: Duration = Duration::from_secs(1);

/// HTTPサーバー
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxserve::{ApiServer, ServiceBuilder};
///
/// # async fn serve() -> Result<(), xlsxserve::XlsxServeError> {
/// let service = ServiceBuilder::from_env()?.build()?;
/// let server = ApiServer::bind(service).await?;
/// println!("listening on {}", server.local_addr()?);
/// server.run().await
/// # }
/// ```
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
    service: Arc<SheetService>,
}

impl ApiServer {
    /// 設定されたアドレスで待ち受けを開始する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxServeError::Io` - アドレスにバインドできない場合
    pub async fn bind(service: SheetService) -> Result<Self, XlsxServeError> {
        let listener = TcpListener::bind(service.config().bind_addr()).await?;
        info!(
            addr = %listener.local_addr()?,
            workbook = %service.workbook_path().display(),
            "listening"
        );

        Ok(Self {
            listener,
            service: Arc::new(service),
        })
    }

    /// 実際に待ち受けているアドレス（ポート0を指定した場合に使用）
    pub fn local_addr(&self) -> Result<SocketAddr, XlsxServeError> {
        Ok(self.listener.local_addr()?)
    }

    /// 接続の受け付けを開始する
    ///
    /// 戻りません。個々の接続のエラーはログに記録され、サーバーは継続します。
    pub async fn run(self) -> Result<(), XlsxServeError> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, service).await {
                    debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// 1つの接続を処理する
async fn handle_connection(
    mut stream: TcpStream,
    service: Arc<SheetService>,
) -> Result<(), XlsxServeError> {
    let config = service.config();
    let limit = config.security.max_request_head_size;

    let head = match tokio::time::timeout(
        config.request_timeout,
        read_request_head(&mut stream, limit),
    )
    .await
    {
        Ok(Ok(Some(head))) => head,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(e @ XlsxServeError::Io(_))) => return Err(e),
        Ok(Err(e)) => {
            let response = error_response(&service, &e);
            return write_response(&mut stream, &response).await;
        }
        Err(_) => {
            warn!("timed out reading request head");
            return Ok(());
        }
    };

    let response = match Request::parse(&head) {
        Ok(request) => dispatch(service, request).await,
        Err(e) => error_response(&service, &e),
    };

    write_response(&mut stream, &response).await
}

/// ルーティングをブロッキングプール上で実行する
async fn dispatch(service: Arc<SheetService>, request: Request) -> Response {
    let started = Instant::now();
    let method = request.method.clone();
    let path = request.path.clone();

    let response = tokio::task::spawn_blocking(move || route(&service, &request))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "request handler panicked");
            Response::internal_error()
        });

    info!(
        %method,
        %path,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn write_response(stream: &mut TcpStream, response: &Response) -> Result<(), XlsxServeError> {
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await?;

    // 未読の入力を読み捨ててから閉じる
    let mut sink = [0u8; 1024];
    let _ = tokio::time::timeout(LINGER_TIMEOUT, async {
        while matches!(stream.read(&mut sink).await, Ok(read) if read > 0) {}
    })
    .await;
    Ok(())
}

/// 空行までのリクエストヘッダーを読み込む
///
/// # 戻り値
///
/// * `Ok(Some(head))` - 空行を含むヘッダー
/// * `Ok(None)` - 何も送信されずに接続が閉じられた場合
/// * `Err(XlsxServeError::SecurityViolation)` - ヘッダーが上限を超えた場合
/// * `Err(XlsxServeError::Http)` - ヘッダーの途中で接続が閉じられた場合
async fn read_request_head<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, XlsxServeError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(XlsxServeError::Http(
                "Connection closed before end of request head".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk[..read]);

        let end = find_head_end(&buffer);
        if end.unwrap_or(buffer.len()) > limit {
            return Err(XlsxServeError::SecurityViolation(format!(
                "Request head exceeds maximum size: {} bytes",
                limit
            )));
        }
        if let Some(end) = end {
            buffer.truncate(end);
            return Ok(Some(buffer));
        }
    }
}

/// ヘッダー終端（空行）の直後の位置
fn find_head_end(buffer: &[u8]) -> Option<usize> {
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4);
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);

    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
