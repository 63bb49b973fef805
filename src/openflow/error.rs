use openflow::messages::*;
use std::error;
use std::fmt;
use std::io;
use std::result;

/// Errors on an OpenFlow connection
#[derive(Debug)]
pub enum Error {
    /// The connection failed
    Io(io::Error),
    /// The datapath sent something that is answered with an error message
    BadRequest(OfpBadRequestCode, Vec<u8>),
    /// The datapath does not speak OpenFlow 1.0
    HelloFailed,
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "OpenFlow connection error"
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::BadRequest(ref code, ref body) => {
                write!(f, "Bad request ({:?}) with a body of {} bytes", code, body.len())
            }
            Error::HelloFailed => write!(f, "OpenFlow version negotiation failed"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = result::Result<T, Error>;
