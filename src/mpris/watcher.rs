//! Follows the active MPRIS player and feeds what it hears into the store.

use crate::mpris::connection::{
    PlayerctldProxy, WatchError, active_player_names, is_blocked, session_bus,
};
use crate::signal::{SignalValue, Source};
use crate::store::SignalStore;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use zbus::proxy;
use zvariant::OwnedValue;

/// Requests the save path can make of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherCommand {
    /// Query the player position now instead of waiting for the next tick.
    RefreshPosition,
}

#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait MediaPlayer2Player {
    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    fn seeked(&self, position: i64) -> zbus::Result<()>;
}

/// Observes one player at a time and writes its signals into the store.
///
/// The notification slot gets the display title, the broadcast slots get
/// the played URL and the position. Values go in raw; the resolver decides
/// usability later.
pub struct PlayerWatcher {
    store: Arc<SignalStore>,
    block: Vec<String>,
    conn: Arc<zbus::Connection>,
    service: Option<String>,
}

impl PlayerWatcher {
    pub async fn new(store: Arc<SignalStore>, block: Vec<String>) -> Result<Self, WatchError> {
        let conn = session_bus().await?;
        Ok(Self {
            store,
            block,
            conn,
            service: None,
        })
    }

    /// Watch players until the process ends, staying responsive to save-path
    /// commands in between bus events.
    pub async fn run(mut self, mut commands: mpsc::Receiver<WatcherCommand>) {
        let playerctld = PlayerctldProxy::new(&self.conn).await.ok();
        let mut names_stream = match &playerctld {
            Some(proxy) => Some(proxy.receive_player_names_changed().await),
            None => None,
        };

        if let Err(e) = self.discover().await {
            tracing::warn!(error = %e, "player discovery failed");
        }

        loop {
            tokio::select! {
                Some(_) = async {
                    if let Some(ref mut stream) = names_stream {
                        stream.next().await
                    } else {
                        None
                    }
                } => {
                    if let Err(e) = self.discover().await {
                        tracing::warn!(error = %e, "player discovery failed");
                    }
                }
                result = self.follow_player(&mut commands) => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "lost the player connection");
                        self.service = None;
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        if let Err(e) = self.discover().await {
                            tracing::warn!(error = %e, "player discovery failed");
                        }
                    }
                }
            }
        }
    }

    /// Follow the current player's signals until it goes away, or idle when
    /// there is none.
    async fn follow_player(
        &mut self,
        commands: &mut mpsc::Receiver<WatcherCommand>,
    ) -> Result<(), WatchError> {
        let Some(service) = self.service.clone() else {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if let Err(e) = self.discover().await {
                        tracing::debug!(error = %e, "player rescan failed");
                    }
                }
                Some(cmd) = commands.recv() => match cmd {
                    WatcherCommand::RefreshPosition => {
                        tracing::debug!("refresh requested with no player to ask");
                    }
                },
            }
            return Ok(());
        };

        let proxy = MediaPlayer2PlayerProxy::builder(&self.conn)
            .destination(service.as_str())?
            .build()
            .await?;

        self.ingest_metadata(&proxy, &service).await?;

        let mut seeked = proxy.receive_seeked().await?;
        let mut metadata_changes = proxy.receive_metadata_changed().await;
        let mut status_changes = proxy.receive_playback_status_changed().await;

        loop {
            tokio::select! {
                Some(signal) = seeked.next() => {
                    if let Ok(args) = signal.args() {
                        self.push_position(args.position).await;
                    }
                }
                Some(_) = metadata_changes.next() => {
                    if let Err(e) = self.ingest_metadata(&proxy, &service).await {
                        tracing::warn!(error = %e, "metadata read failed");
                    }
                }
                Some(_) = status_changes.next() => {
                    // Play/pause moves the position; pick it up right away.
                    if let Err(e) = self.refresh_position(&service).await {
                        tracing::debug!(error = %e, "position read failed");
                    }
                }
                Some(cmd) = commands.recv() => match cmd {
                    WatcherCommand::RefreshPosition => self.refresh_position(&service).await?,
                },
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    // The periodic read doubles as the liveness probe.
                    if let Err(e) = self.refresh_position(&service).await {
                        tracing::info!(%service, error = %e, "player left the bus");
                        self.service = None;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Pick the first unblocked player, or clear the current one if none
    /// remains.
    async fn discover(&mut self) -> Result<(), WatchError> {
        let names = active_player_names(&self.conn).await?;
        match names.iter().find(|name| !is_blocked(name, &self.block)) {
            Some(service) => {
                if self.service.as_deref() != Some(service.as_str()) {
                    tracing::info!(%service, "following player");
                    self.service = Some(service.clone());
                }
            }
            None => {
                if self.service.take().is_some() {
                    tracing::info!("no unblocked player on the bus");
                }
            }
        }
        Ok(())
    }

    async fn ingest_metadata(
        &self,
        proxy: &MediaPlayer2PlayerProxy<'_>,
        service: &str,
    ) -> Result<(), WatchError> {
        let map = proxy.metadata().await?;
        let now = Instant::now();
        if let Some(title) = string_field(&map, "xesam:title") {
            self.store
                .put(Source::Notification, SignalValue::TrackName(title), now)
                .await;
        }
        if let Some(url) = string_field(&map, "xesam:url") {
            self.store
                .put(
                    Source::Broadcast,
                    SignalValue::TrackName(url_to_broadcast_name(&url)),
                    now,
                )
                .await;
        }
        self.refresh_position(service).await
    }

    async fn refresh_position(&self, service: &str) -> Result<(), WatchError> {
        let micros = query_position_micros(&self.conn, service).await?;
        self.push_position(micros).await;
        Ok(())
    }

    async fn push_position(&self, position_micros: i64) {
        self.store
            .put(
                Source::Broadcast,
                SignalValue::PositionMillis(micros_to_millis(position_micros)),
                Instant::now(),
            )
            .await;
    }
}

/// Read the player position with a targeted `Properties.Get`. Players do
/// not signal `Position` changes, so the proxy cache would serve the same
/// value forever; a direct call also avoids the `GetAll` some players
/// mishandle.
async fn query_position_micros(conn: &zbus::Connection, service: &str) -> Result<i64, WatchError> {
    let props = zbus::Proxy::new(
        conn,
        service,
        "/org/mpris/MediaPlayer2",
        "org.freedesktop.DBus.Properties",
    )
    .await?;
    let reply = props
        .call_method("Get", &("org.mpris.MediaPlayer2.Player", "Position"))
        .await?;
    let value = reply.body().deserialize::<OwnedValue>()?;
    Ok(position_from_value(&value).unwrap_or(0))
}

/// Pull a microsecond count out of whatever integer shape the player chose.
fn position_from_value(value: &OwnedValue) -> Option<i64> {
    if let Ok(micros) = i64::try_from(value.clone()) {
        return Some(micros);
    }
    if let Ok(micros) = u64::try_from(value.clone()) {
        return Some(micros.min(i64::MAX as u64) as i64);
    }
    if let Ok((micros,)) = <(i64,)>::try_from(value.clone()) {
        return Some(micros);
    }
    if let Ok((micros,)) = <(u64,)>::try_from(value.clone()) {
        return Some(micros.min(i64::MAX as u64) as i64);
    }
    None
}

/// Convert an MPRIS position (microseconds, may be negative) to milliseconds.
fn micros_to_millis(position_micros: i64) -> u64 {
    position_micros.max(0) as u64 / 1_000
}

/// Map an `xesam:url` value to a broadcast name candidate. `file://` URLs
/// become their decoded path; anything else passes through unchanged and is
/// rejected by the sanitizer at resolve time.
fn url_to_broadcast_name(url: &str) -> String {
    match url.strip_prefix("file://") {
        Some(rest) => match urlencoding::decode(rest) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => rest.to_string(),
        },
        None => url.to_string(),
    }
}

fn string_field(map: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(|value| String::try_from(value.clone()).ok())
}
