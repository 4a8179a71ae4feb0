use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether wikimaps' clients connect to it over https.
    /// If so, the sessionid cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address wikimaps should listen on. By default
    /// wikimaps will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port wikimaps listens on.
    #[arg(short, long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// Which environment's database to open.
    #[arg(short, long, default_value = "development", env = "ENV")]
    env: String,

    /// Maps-provider API key, injected into rendered pages.
    #[arg(long, env = "GOOGLEMAPS_APIKEY")]
    api_key: Option<String>,

    /// Directory the database lives in.
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
