/*!
A parser for an INI file with the following structure:

```ini
[Connection]
uri=tcp:0.0.0.0:6633

[Bus]
uri=tcp:127.0.0.1:6666

[Proxy]
id=0
rfvs_prefix=0x72667673
```

Every section and key is optional. A URI without port uses the
OpenFlow port 6633 for `[Connection]` and 6666 for `[Bus]`.
*/

use openflow::messages::OFP_TCP_PORT;
use proxy::DEFAULT_RFVS_PREFIX;

use ini::ini;
use ini::Ini;

use std::error;
use std::fmt;
use std::io;
use std::net::*;
use std::num::ParseIntError;
use std::str::FromStr;

/// The default port of the message bus
pub const BUS_TCP_PORT: u16 = 6666;

const CONN_SECTION: &str = "Connection";
const BUS_SECTION: &str = "Bus";
const URI_KEY: &str = "uri";

const PROXY_SECTION: &str = "Proxy";
const ID_KEY: &str = "id";
const PREFIX_KEY: &str = "rfvs_prefix";

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Ini(ini::Error),
    ParseInt(&'static str, ParseIntError),
    InvalidUri(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::Ini(ref e) => write!(f, "{}", e),
            Error::ParseInt(key, ref e) => {
                write!(f, "Error on trying to parse the [{}] {}: {}", PROXY_SECTION, key, e)
            }
            Error::InvalidUri(ref uri) => write!(f, "The URI {} from INI file is invalid", uri),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(ioe) => ioe,
            _ => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "INI configuration parser error"
    }
}

#[derive(Debug, PartialEq)]
enum ConnectionProtocol {
    Tcp,
}
impl FromStr for ConnectionProtocol {
    type Err = ();

    fn from_str(proto: &str) -> Result<ConnectionProtocol, Self::Err> {
        match proto {
            "tcp" => Ok(ConnectionProtocol::Tcp),
            _ => Err(()),
        }
    }
}

/// Parses `tcp:<ip>[:<port>]`, using `def_port` if the port is missing
fn parse_uri(uri: &str, def_port: u16) -> Result<SocketAddr, Error> {
    let def_port = def_port.to_string();
    let mut uri_split: Vec<_> = uri.split(':').collect();
    if uri_split.len() == 2 {
        uri_split.push(&def_port);
    }
    if uri_split.len() == 3 && ConnectionProtocol::from_str(uri_split[0]).is_ok() {
        let joined = &format!("{}:{}", uri_split[1], uri_split[2]);
        if let Ok(socket) = SocketAddr::from_str(joined) {
            return Ok(socket);
        }
    }
    Err(Error::InvalidUri(uri.to_owned()))
}

/// Splits a decimal or 0x-prefixed hexadecimal number into digits and radix
fn split_radix(num: &str) -> (&str, u32) {
    if num.starts_with("0x") || num.starts_with("0X") {
        (&num[2..], 16)
    }
    else {
        (num, 10)
    }
}

trait Section {
    type S;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error>;
}

fn socket_from_ini(conf: &Ini, section: &str, def: SocketAddr) -> Result<SocketAddr, Error> {
    debug!("Reading [{}] section", section);

    let uri = conf
        .section(Some(section.to_owned()))
        .and_then(|s| s.get(URI_KEY));
    let socket = match uri {
        Some(uri) => parse_uri(uri, def.port())?,
        None => def,
    };
    debug!("Got {}", socket);
    Ok(socket)
}

/// The address the proxy listens on for OpenFlow switches
#[derive(Debug, PartialEq)]
pub struct OfConnection {
    pub socket: SocketAddr,
}
impl Section for OfConnection {
    type S = OfConnection;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        let def = OfConnection::default().socket;
        Ok(OfConnection {
            socket: socket_from_ini(conf, CONN_SECTION, def)?,
        })
    }
}
impl Default for OfConnection {
    fn default() -> Self {
        let socket_v4 = SocketAddrV4::new(Ipv4Addr::new(0, 0, 0, 0), OFP_TCP_PORT);
        OfConnection {
            socket: SocketAddr::V4(socket_v4),
        }
    }
}

/// The message bus endpoint of the route control service
#[derive(Debug, PartialEq)]
pub struct BusConnection {
    pub socket: SocketAddr,
}
impl Section for BusConnection {
    type S = BusConnection;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        let def = BusConnection::default().socket;
        Ok(BusConnection {
            socket: socket_from_ini(conf, BUS_SECTION, def)?,
        })
    }
}
impl Default for BusConnection {
    fn default() -> Self {
        let socket_v4 = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), BUS_TCP_PORT);
        BusConnection {
            socket: SocketAddr::V4(socket_v4),
        }
    }
}

/// The proxy's identity
#[derive(Debug, PartialEq)]
pub struct Proxy {
    /// The controller id reported on the bus
    pub id: u64,
    /// The upper 32 bits of virtual switch datapath ids
    pub rfvs_prefix: u32,
}
impl Section for Proxy {
    type S = Proxy;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", PROXY_SECTION);

        let mut proxy = Proxy::default();
        if let Some(section) = conf.section(Some(PROXY_SECTION.to_owned())) {
            if let Some(id) = section.get(ID_KEY) {
                let (digits, radix) = split_radix(id);
                proxy.id =
                    u64::from_str_radix(digits, radix).map_err(|e| Error::ParseInt(ID_KEY, e))?;
            }
            if let Some(prefix) = section.get(PREFIX_KEY) {
                let (digits, radix) = split_radix(prefix);
                proxy.rfvs_prefix = u32::from_str_radix(digits, radix)
                    .map_err(|e| Error::ParseInt(PREFIX_KEY, e))?;
            }
        }

        debug!("Got {:?}", proxy);
        Ok(proxy)
    }
}
impl Default for Proxy {
    fn default() -> Self {
        Proxy {
            id: 0,
            rfvs_prefix: DEFAULT_RFVS_PREFIX,
        }
    }
}

/// The whole configuration
#[derive(Debug, Default, PartialEq)]
pub struct Conf {
    pub connection: OfConnection,
    pub bus: BusConnection,
    pub proxy: Proxy,
}
impl Section for Conf {
    type S = Conf;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        Ok(Conf {
            connection: OfConnection::from_ini(conf)?,
            bus: BusConnection::from_ini(conf)?,
            proxy: Proxy::from_ini(conf)?,
        })
    }
}

/// Reads the configuration from the INI file at `path`
/// or returns the defaults if there is none
pub fn parse_file(path: Option<&str>) -> Result<Conf, Error> {
    let path = match path {
        Some(p) => p,
        None => {
            info!("No INI file given, using the default configuration");
            return Ok(Conf::default());
        }
    };
    info!("Reading INI file {}", path);

    let conf = match Ini::load_from_file(path) {
        Ok(i) => i,
        Err(e) => {
            return Err(Error::Ini(e));
        }
    };

    Conf::from_ini(&conf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ini: &str) -> Result<Conf, Error> {
        Conf::from_ini(&Ini::load_from_str(ini).unwrap())
    }

    #[test]
    fn empty_file_gives_defaults() {
        let conf = parse("").unwrap();
        assert_eq!(Conf::default(), conf);
        assert_eq!("0.0.0.0:6633", conf.connection.socket.to_string());
        assert_eq!("127.0.0.1:6666", conf.bus.socket.to_string());
        assert_eq!(0x7266_7673, conf.proxy.rfvs_prefix);
    }

    #[test]
    fn full_file() {
        let ini = "[Connection]\n\
                   uri=tcp:192.0.2.1:6653\n\
                   [Bus]\n\
                   uri=tcp:192.0.2.2\n\
                   [Proxy]\n\
                   id=12\n\
                   rfvs_prefix=0x12345678\n";
        let conf = parse(ini).unwrap();
        assert_eq!("192.0.2.1:6653", conf.connection.socket.to_string());
        assert_eq!("192.0.2.2:6666", conf.bus.socket.to_string());
        assert_eq!(12, conf.proxy.id);
        assert_eq!(0x1234_5678, conf.proxy.rfvs_prefix);
    }

    #[test]
    fn uris() {
        let socket = parse_uri("tcp:192.0.2.1:6633", BUS_TCP_PORT).unwrap();
        assert_eq!("192.0.2.1:6633", socket.to_string());
        assert!(parse_uri("tls:192.0.2.1:6633", OFP_TCP_PORT).is_err());
        assert!(parse_uri("192.0.2.1", OFP_TCP_PORT).is_err());
        assert!(parse_uri("tcp:192.0.2.1:port", OFP_TCP_PORT).is_err());
    }

    #[test]
    fn invalid_values() {
        assert!(parse("[Bus]\nuri=udp:127.0.0.1:1").is_err());
        assert!(parse("[Proxy]\nid=-1").is_err());
        assert!(parse("[Proxy]\nrfvs_prefix=0x100000000").is_err());
    }

    #[test]
    fn radix() {
        assert_eq!(("ff", 16), split_radix("0xff"));
        assert_eq!(("255", 10), split_radix("255"));
    }
}
