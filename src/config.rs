//! Server configuration.
//!
//! Every option can be given on the command line or through an
//! `ATTENDANCE_*` environment variable; the flag wins when both are set.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Attendance tracker web server
#[derive(Debug, Clone, Parser)]
#[command(name = "attendance-web", version, about)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "ATTENDANCE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "ATTENDANCE_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Roster file with columns id,name,photo_path (.csv/.txt, or .xlsx/.xls/.xlsb/.ods read once at startup)
    #[arg(long, env = "ATTENDANCE_ROSTER", default_value = "students.csv")]
    pub roster: PathBuf,

    /// Presence log, one student ID per line
    #[arg(long, env = "ATTENDANCE_PRESENT_FILE", default_value = "present.txt")]
    pub present_file: PathBuf,

    /// Keep presence in memory instead of the presence log
    #[arg(long, env = "ATTENDANCE_IN_MEMORY")]
    pub in_memory: bool,

    /// Directory for issued per-student QR images
    #[arg(long, env = "ATTENDANCE_QR_DIR", default_value = "qrcodes")]
    pub qr_dir: PathBuf,

    /// Base URL phones use to reach this server, e.g. http://192.168.1.10:5000
    #[arg(long, env = "ATTENDANCE_PUBLIC_URL")]
    pub public_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            roster: PathBuf::from("students.csv"),
            present_file: PathBuf::from("present.txt"),
            in_memory: false,
            qr_dir: PathBuf::from("qrcodes"),
            public_url: None,
        }
    }
}

impl Config {
    /// Base URL for links encoded in QR codes
    ///
    /// An explicit `public_url` wins. Otherwise `lan_ip` stands in for an
    /// unspecified bind address, falling back to the bind address itself.
    pub fn base_url(&self, lan_ip: Option<IpAddr>) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }

        let host = match lan_ip {
            Some(ip) if self.host.is_unspecified() => ip,
            _ => self.host,
        };
        match host {
            IpAddr::V6(v6) => format!("http://[{}]:{}", v6, self.port),
            IpAddr::V4(v4) => format!("http://{}:{}", v4, self.port),
        }
    }

    /// URL of the mobile entry page
    pub fn mobile_url(&self, lan_ip: Option<IpAddr>) -> String {
        format!("{}/mobile", self.base_url(lan_ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_parsed_defaults() {
        let parsed = Config::try_parse_from(["attendance-web"]).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.host, defaults.host);
        assert_eq!(parsed.port, defaults.port);
        assert_eq!(parsed.roster, defaults.roster);
        assert_eq!(parsed.present_file, defaults.present_file);
        assert_eq!(parsed.qr_dir, defaults.qr_dir);
        assert!(!parsed.in_memory);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "attendance-web",
            "--port",
            "8080",
            "--roster",
            "class.xlsx",
            "--in-memory",
            "--public-url",
            "http://attendance.local/",
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.roster, PathBuf::from("class.xlsx"));
        assert!(config.in_memory);
        assert_eq!(config.mobile_url(None), "http://attendance.local/mobile");
    }

    #[test]
    fn base_url_prefers_lan_ip_for_unspecified_host() {
        let config = Config::default();
        let lan = IpAddr::from([192, 168, 1, 10]);

        assert_eq!(config.base_url(Some(lan)), "http://192.168.1.10:5000");
        assert_eq!(config.base_url(None), "http://0.0.0.0:5000");

        let bound = Config {
            host: IpAddr::from([127, 0, 0, 1]),
            ..Config::default()
        };
        assert_eq!(bound.base_url(Some(lan)), "http://127.0.0.1:5000");
    }
}
