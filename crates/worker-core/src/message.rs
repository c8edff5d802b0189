use tracing::{debug, warn};

use crate::{error::WorkerError, host::WorkerHost};

/// Posted by a page to activate a waiting worker straight away
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Returns whether the message was understood
pub async fn message<H: WorkerHost>(host: &H, data: Option<&str>) -> Result<bool, WorkerError> {
    match data {
        Some(SKIP_WAITING) => {
            debug!("worker_message got SKIP_WAITING");
            host.skip_waiting().await?;
            Ok(true)
        }
        other => {
            warn!(data = ?other, "worker_message got unexpected message");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod test {
    use tokio_test::block_on;

    use super::*;
    use crate::memory::MemoryHost;

    #[test]
    fn test_skip_waiting_message() {
        let host = MemoryHost::new("https://app.test/").unwrap();
        assert!(block_on(message(&host, Some("SKIP_WAITING"))).unwrap());
        assert_eq!(host.skip_waiting_calls(), 1);
    }

    #[test]
    fn test_other_message_ignored() {
        let host = MemoryHost::new("https://app.test/").unwrap();
        assert!(!block_on(message(&host, Some("hello"))).unwrap());
        assert!(!block_on(message(&host, None)).unwrap());
        assert_eq!(host.skip_waiting_calls(), 0);
    }
}
