use snafu::Snafu;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub(crate) enum LibError {
    #[snafu(display("{}: i/o failure: {}", site, source))]
    IoFailed { site: String, source: std::io::Error },

    #[snafu(display("{}: truncated or corrupt byte stream: {}", site, source))]
    TruncatedStream {
        site: String,
        source: crate::byte_iter::ByteError,
    },

    #[snafu(display("{}: malformed header chunk: {}", site, description))]
    MalformedHeader { site: String, description: String },

    #[snafu(display("{}: running status byte encountered with no prior status", site))]
    RunningStatusWithoutPrior { site: String },

    #[snafu(display("{}: invalid variable-length value: {}", site, description))]
    InvalidVlv { site: String, description: String },

    #[snafu(display("{}: invalid parameter: {}", site, description))]
    InvalidParameter { site: String, description: String },

    #[snafu(display("{}: unrecognized or out-of-range value: {}", site, description))]
    WrongKind { site: String, description: String },

    #[snafu(display("{}: operation not valid in current state: {}", site, description))]
    StateViolation { site: String, description: String },

    #[snafu(display("{}: track data is too long to encode its length as a u32", site))]
    TrackTooLong {
        site: String,
        source: std::num::TryFromIntError,
    },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

/// Used with `.context()` on a `ByteResult`/`ByteError` produced while reading.
macro_rules! io {
    () => {
        crate::error::TruncatedStream { site: site!() }
    };
}

/// Used with `.context()` on a raw `std::io::Error` produced while writing.
macro_rules! wr {
    () => {
        crate::error::IoFailed { site: site!() }
    };
}

macro_rules! malformed_header_s {
    ($msg:expr) => {
        crate::error::MalformedHeader {
            site: site!(),
            description: $msg,
        }
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::MalformedHeader {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
    };
}

macro_rules! malformed_header {
    ($msg:expr) => {
        return Err(malformed_header_s!($msg).build().into())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(malformed_header_s!($fmt, $($arg),+).build().into())
    };
}

macro_rules! wrong_kind_s {
    ($msg:expr) => {
        crate::error::WrongKind {
            site: site!(),
            description: $msg,
        }
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::WrongKind {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
    };
}

/// The file structure parsed to something unrecognized or out of range.
macro_rules! invalid_file {
    ($msg:expr) => {
        return Err(wrong_kind_s!($msg).build().into())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(wrong_kind_s!($fmt, $($arg),+).build().into())
    };
}

macro_rules! invalid_parameter {
    ($msg:expr) => {
        return Err(crate::error::InvalidParameter {
            site: site!(),
            description: $msg,
        }
        .build()
        .into())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(crate::error::InvalidParameter {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build()
        .into())
    };
}

/// Converts a [`crate::vlq::VlqError`] (raised when a value is too large to encode as a VLQ)
/// into this crate's error type.
macro_rules! invalid_vlv {
    ($source:expr) => {
        crate::error::InvalidVlv {
            site: site!(),
            description: $source.to_string(),
        }
        .build()
    };
}

macro_rules! state_violation {
    ($msg:expr) => {
        return Err(crate::error::StateViolation {
            site: site!(),
            description: $msg,
        }
        .build()
        .into())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(crate::error::StateViolation {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build()
        .into())
    };
}

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn invalid_file_macros_test_message() {
    fn foo() -> LibResult<u64> {
        invalid_file!("flerbin");
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("flerbin"));
}

#[test]
fn invalid_file_macros_test_fmt() {
    fn foo() -> LibResult<u64> {
        invalid_file!("hello {}, {}", "world", String::from("foo"));
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("hello world, foo"));
}
