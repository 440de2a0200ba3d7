use crate::error::LinkError;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Duration, Instant};

/// Network association collaborator.
///
/// `is_connected` is queried before every outbound request, so it should be
/// cheap relative to the request itself.
#[allow(async_fn_in_trait)]
pub trait NetworkLink {
    /// Kick off association with the configured network identity
    async fn begin(&mut self, timeout: Duration) -> Result<(), LinkError>;

    async fn is_connected(&mut self) -> bool;

    /// Begin association, then poll status until connected or `limit` elapses
    async fn associate(&mut self, limit: Duration, poll: Duration) -> Result<(), LinkError> {
        let start = Instant::now();
        self.begin(limit).await?;

        while !self.is_connected().await {
            if start.elapsed() >= limit {
                return Err(LinkError::Timeout(limit.as_millis() as u64));
            }
            log::debug!("Waiting for network ({} ms)", start.elapsed().as_millis());
            sleep(poll).await;
        }

        log::info!("Network connected after {} ms", start.elapsed().as_millis());
        Ok(())
    }
}

/// Joins a Wi-Fi network through NetworkManager's `nmcli`
pub struct NmcliLink {
    ssid: String,
    password: String,
}

impl NmcliLink {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        }
    }
}

impl NetworkLink for NmcliLink {
    async fn begin(&mut self, limit: Duration) -> Result<(), LinkError> {
        log::info!("Connecting to Wi-Fi network {:?}", self.ssid);
        let wait_secs = limit.as_secs().max(1).to_string();

        let mut cmd = Command::new("nmcli");
        cmd.arg("--wait")
            .arg(&wait_secs)
            .arg("device")
            .arg("wifi")
            .arg("connect")
            .arg(&self.ssid);
        if !self.password.is_empty() {
            cmd.arg("password").arg(&self.password);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| LinkError::Command(format!("nmcli: {}", e)))?;

        if !output.status.success() {
            // Not fatal: status polling decides whether we ended up online
            log::warn!(
                "nmcli connect failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        match Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("STATE")
            .arg("general")
            .output()
            .await
        {
            Ok(output) => parse_nmcli_state(&String::from_utf8_lossy(&output.stdout)),
            Err(_) => false,
        }
    }
}

/// `nmcli -t -f STATE general` prints e.g. "connected" or "connected (site only)".
/// Only full connectivity counts.
pub fn parse_nmcli_state(output: &str) -> bool {
    output.trim() == "connected"
}

/// Wired/bench hosts: the link is "up" while a TCP connection to `addr` succeeds
pub struct ProbeLink {
    addr: String,
    probe_timeout: Duration,
}

impl ProbeLink {
    pub fn new(addr: &str, probe_timeout: Duration) -> Self {
        Self {
            addr: addr.to_string(),
            probe_timeout,
        }
    }
}

impl NetworkLink for ProbeLink {
    async fn begin(&mut self, _limit: Duration) -> Result<(), LinkError> {
        log::info!("Probing network reachability via {}", self.addr);
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        matches!(
            timeout(self.probe_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Link with a fixed state. `up()` for hosts whose connectivity is managed
/// elsewhere, `down()` for offline bench runs.
#[derive(Debug, Default)]
pub struct FixedLink {
    up: bool,
    queries: usize,
}

impl FixedLink {
    pub fn up() -> Self {
        Self { up: true, queries: 0 }
    }

    pub fn down() -> Self {
        Self { up: false, queries: 0 }
    }

    /// Status queries served so far
    pub fn queries(&self) -> usize {
        self.queries
    }
}

impl NetworkLink for FixedLink {
    async fn begin(&mut self, _limit: Duration) -> Result<(), LinkError> {
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.queries += 1;
        self.up
    }
}

/// Runtime selection between the link implementations
pub enum AnyLink {
    Nmcli(NmcliLink),
    Probe(ProbeLink),
    Fixed(FixedLink),
}

impl NetworkLink for AnyLink {
    async fn begin(&mut self, limit: Duration) -> Result<(), LinkError> {
        match self {
            AnyLink::Nmcli(link) => link.begin(limit).await,
            AnyLink::Probe(link) => link.begin(limit).await,
            AnyLink::Fixed(link) => link.begin(limit).await,
        }
    }

    async fn is_connected(&mut self) -> bool {
        match self {
            AnyLink::Nmcli(link) => link.is_connected().await,
            AnyLink::Probe(link) => link.is_connected().await,
            AnyLink::Fixed(link) => link.is_connected().await,
        }
    }
}
