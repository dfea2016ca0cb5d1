//! D-Bus connection management and player discovery.

use std::sync::Arc;
use tokio::sync::OnceCell;
use zbus::proxy;

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("D-Bus error: {0}")]
    ZBus(#[from] zbus::Error),
    #[error("D-Bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),
    #[error("failed to establish D-Bus connection")]
    NoConnection,
}

/// Shared session bus connection, established once.
static SESSION_BUS: OnceCell<Arc<zbus::Connection>> = OnceCell::const_new();

pub async fn session_bus() -> Result<Arc<zbus::Connection>, WatchError> {
    SESSION_BUS
        .get_or_try_init(|| async {
            let conn = zbus::Connection::session()
                .await
                .map_err(|_| WatchError::NoConnection)?;
            Ok(Arc::new(conn))
        })
        .await
        .cloned()
}

/// Proxy for playerctld, which tracks active MPRIS players in most-recent
/// order.
#[proxy(
    interface = "com.github.altdesktop.playerctld",
    default_service = "org.mpris.MediaPlayer2.playerctld",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub(crate) trait Playerctld {
    #[zbus(property)]
    fn player_names(&self) -> zbus::Result<Vec<String>>;
}

/// List candidate MPRIS player services.
///
/// Prefers playerctld's ordered list when it is running, otherwise scans
/// the bus for `org.mpris.MediaPlayer2.*` names directly.
pub async fn active_player_names(conn: &zbus::Connection) -> Result<Vec<String>, WatchError> {
    if let Ok(proxy) = PlayerctldProxy::new(conn).await
        && let Ok(names) = proxy.player_names().await
    {
        return Ok(names);
    }

    let dbus = zbus::fdo::DBusProxy::new(conn).await?;
    let names = dbus
        .list_names()
        .await?
        .into_iter()
        .map(|name| name.as_str().to_owned())
        .filter(|name| name.starts_with("org.mpris.MediaPlayer2."))
        .collect();
    Ok(names)
}

/// Whether a player service matches the blocklist, case-insensitively and
/// by substring.
pub fn is_blocked(service: &str, block_list: &[String]) -> bool {
    let service_lower = service.to_lowercase();
    block_list
        .iter()
        .any(|blocked| service_lower.contains(&blocked.to_lowercase()))
}
