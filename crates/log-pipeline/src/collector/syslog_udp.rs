//! UDP syslog 리스너
//!
//! 각 데이터그램을 하나의 완성된 메시지로 취급합니다.
//! 수신 버퍼보다 큰 데이터그램은 버퍼 크기만큼 잘려서 처리됩니다.

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::syslog::SyslogHandler;

/// 데이터그램 수신 버퍼 크기 (바이트)
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// 취소될 때까지 데이터그램 수신 루프를 실행합니다.
pub(crate) async fn serve(socket: UdpSocket, handler: SyslogHandler, cancel: CancellationToken) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    debug!(peer = %peer, bytes = len, "syslog datagram received");
                    handler.handle(&buf[..len]);
                }
                Err(e) => {
                    // ICMP port unreachable 등 일시적 에러
                    warn!(error = %e, "syslog udp receive failed");
                }
            },
            _ = cancel.cancelled() => {
                info!("syslog udp listener received shutdown signal");
                break;
            }
        }
    }
}
