//! The exception value carried through scrubbed code.
//!
//! An [`Exception`] is an error value with a stable runtime type
//! ([`ExceptionType`]), positional arguments, a frame list (most recent call
//! last), and two optional links: an explicit cause and an implicit context
//! ("raised while handling").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Function name used when a frame's function is not known.
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Runtime type identity of an exception.
///
/// Types are declared as `static` items and form a single-inheritance
/// hierarchy through `base`. Identity is the static's address: two
/// separately declared statics are different types even when their names
/// and bases match.
#[derive(Debug)]
pub struct ExceptionType {
    name: &'static str,
    base: Option<&'static ExceptionType>,
}

impl ExceptionType {
    /// Declare a type deriving from `base`.
    pub const fn new(name: &'static str, base: &'static ExceptionType) -> Self {
        Self {
            name,
            base: Some(base),
        }
    }

    /// Declare a root type.
    pub const fn root(name: &'static str) -> Self {
        Self { name, base: None }
    }

    /// Stable type name, used for matching and display.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parent type, if any.
    pub fn base(&self) -> Option<&'static ExceptionType> {
        self.base
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subtype_of(&self, other: &ExceptionType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.base;
        }
        false
    }
}

impl PartialEq for ExceptionType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ExceptionType {}

impl std::hash::Hash for ExceptionType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub static EXCEPTION: ExceptionType = ExceptionType::root("Exception");
pub static ARITHMETIC_ERROR: ExceptionType = ExceptionType::new("ArithmeticError", &EXCEPTION);
pub static ZERO_DIVISION_ERROR: ExceptionType =
    ExceptionType::new("ZeroDivisionError", &ARITHMETIC_ERROR);
pub static ASSERTION_ERROR: ExceptionType = ExceptionType::new("AssertionError", &EXCEPTION);
pub static LOOKUP_ERROR: ExceptionType = ExceptionType::new("LookupError", &EXCEPTION);
pub static KEY_ERROR: ExceptionType = ExceptionType::new("KeyError", &LOOKUP_ERROR);
pub static IMPORT_ERROR: ExceptionType = ExceptionType::new("ImportError", &EXCEPTION);
pub static MODULE_NOT_FOUND_ERROR: ExceptionType =
    ExceptionType::new("ModuleNotFoundError", &IMPORT_ERROR);
pub static OS_ERROR: ExceptionType = ExceptionType::new("OSError", &EXCEPTION);
pub static RUNTIME_ERROR: ExceptionType = ExceptionType::new("RuntimeError", &EXCEPTION);
pub static VALUE_ERROR: ExceptionType = ExceptionType::new("ValueError", &EXCEPTION);
pub static ARGUMENT_ERROR: ExceptionType = ExceptionType::new("ArgumentError", &EXCEPTION);

/// A panic caught inside a harness. The payload text is the message.
pub static PANIC_ERROR: ExceptionType = ExceptionType::new("PanicError", &RUNTIME_ERROR);

/// Value error whose message is always safe to disclose.
pub static PUBLIC_VALUE_ERROR: ExceptionType =
    ExceptionType::new("PublicValueError", &VALUE_ERROR);
/// Runtime error whose message is always safe to disclose.
pub static PUBLIC_RUNTIME_ERROR: ExceptionType =
    ExceptionType::new("PublicRuntimeError", &RUNTIME_ERROR);
/// Argument error whose message is always safe to disclose.
pub static PUBLIC_ARGUMENT_ERROR: ExceptionType =
    ExceptionType::new("PublicArgumentError", &ARGUMENT_ERROR);

/// A non-string argument. Shared, never inspected beyond `Debug`.
#[derive(Clone)]
pub struct OpaqueValue(Arc<dyn fmt::Debug + Send + Sync>);

impl OpaqueValue {
    pub fn new<T: fmt::Debug + Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque values compare by identity.
impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A positional exception argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Str(String),
    Opaque(OpaqueValue),
}

impl Payload {
    pub fn opaque<T: fmt::Debug + Send + Sync + 'static>(value: T) -> Self {
        Payload::Opaque(OpaqueValue::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            Payload::Opaque(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Str(value)
    }
}

/// One stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub function: String,
    /// Source line shown under the location. Empty when unavailable.
    #[serde(default)]
    pub source_text: String,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
            source_text: String::new(),
        }
    }

    /// Frame for the caller's location, function unknown.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line(), UNKNOWN_FUNCTION)
    }

    pub fn with_source(mut self, source_text: impl Into<String>) -> Self {
        self.source_text = source_text.into();
        self
    }
}

/// An exception value.
#[derive(Debug, Clone)]
pub struct Exception {
    kind: &'static ExceptionType,
    args: Vec<Payload>,
    frames: Vec<Frame>,
    cause: Option<Arc<Exception>>,
    context: Option<Arc<Exception>>,
}

impl Exception {
    /// Create an exception of `kind` with no arguments, recording the
    /// caller's location as its only frame.
    #[track_caller]
    pub fn new(kind: &'static ExceptionType) -> Self {
        let mut exception = Self::bare(kind);
        exception.frames.push(Frame::caller());
        exception
    }

    /// Create an exception with a single string argument.
    #[track_caller]
    pub fn with_message(kind: &'static ExceptionType, message: impl Into<String>) -> Self {
        Self::new(kind).arg(message.into())
    }

    /// Create an exception with no frames.
    pub fn bare(kind: &'static ExceptionType) -> Self {
        Self {
            kind,
            args: Vec::new(),
            frames: Vec::new(),
            cause: None,
            context: None,
        }
    }

    /// Wrap a std error: its display becomes the message and its source
    /// chain becomes the explicit cause chain.
    #[track_caller]
    pub fn from_error(kind: &'static ExceptionType, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut exception = Self::from_error_untraced(kind, err);
        exception.frames.push(Frame::caller());
        exception
    }

    fn from_error_untraced(
        kind: &'static ExceptionType,
        err: &(dyn std::error::Error + 'static),
    ) -> Self {
        let mut exception = Self::bare(kind).arg(err.to_string());
        if let Some(source) = err.source() {
            exception.cause = Some(Arc::new(Self::from_error_untraced(&EXCEPTION, source)));
        }
        exception
    }

    /// Exception of type [`PANIC_ERROR`] for a panic payload, with no
    /// frames. `&str` and `String` payloads become the message.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let exception = Self::bare(&PANIC_ERROR);
        if let Some(message) = payload.downcast_ref::<&str>() {
            exception.arg(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            exception.arg(message.clone())
        } else {
            exception
        }
    }

    pub fn arg(mut self, payload: impl Into<Payload>) -> Self {
        self.args.push(payload.into());
        self
    }

    pub fn opaque_arg<T: fmt::Debug + Send + Sync + 'static>(self, value: T) -> Self {
        self.arg(Payload::opaque(value))
    }

    pub fn with_args(mut self, args: Vec<Payload>) -> Self {
        self.args = args;
        self
    }

    /// Set the explicit cause.
    pub fn caused_by(mut self, cause: impl Into<Arc<Exception>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Set the implicit context: the exception being handled when this
    /// one was raised.
    pub fn during(mut self, handled: impl Into<Arc<Exception>>) -> Self {
        self.context = Some(handled.into());
        self
    }

    /// Append a frame as the most recent call.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Record the caller as an outer frame while the exception propagates.
    #[track_caller]
    pub fn traced(mut self) -> Self {
        self.frames.insert(0, Frame::caller());
        self
    }

    /// Name the function of the most recent frame if it is unknown.
    pub fn in_function(mut self, function: &str) -> Self {
        if let Some(frame) = self.frames.last_mut() {
            if frame.function == UNKNOWN_FUNCTION {
                frame.function = function.to_string();
            }
        }
        self
    }

    pub fn kind(&self) -> &'static ExceptionType {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn args(&self) -> &[Payload] {
        &self.args
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn cause(&self) -> Option<&Exception> {
        self.cause.as_deref()
    }

    pub fn context(&self) -> Option<&Exception> {
        self.context.as_deref()
    }

    /// Exact type identity.
    pub fn is(&self, ty: &ExceptionType) -> bool {
        self.kind == ty
    }

    /// Type identity including base types.
    pub fn is_instance(&self, ty: &ExceptionType) -> bool {
        self.kind.is_subtype_of(ty)
    }

    /// Message derived from the arguments.
    ///
    /// No arguments give an empty message, a single argument gives its
    /// text, several arguments give a parenthesised list.
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            [Payload::Str(s)] => s.clone(),
            [Payload::Opaque(value)] => format!("{value:?}"),
            many => {
                let parts: Vec<String> = many
                    .iter()
                    .map(|payload| match payload {
                        Payload::Str(s) => format!("{s:?}"),
                        Payload::Opaque(value) => format!("{value:?}"),
                    })
                    .collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .or(self.context.as_deref())
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Exception {
    fn from(err: std::io::Error) -> Self {
        Exception::from_error_untraced(&OS_ERROR, &err)
    }
}

impl From<std::num::ParseIntError> for Exception {
    fn from(err: std::num::ParseIntError) -> Self {
        Exception::from_error_untraced(&VALUE_ERROR, &err)
    }
}

impl From<std::num::ParseFloatError> for Exception {
    fn from(err: std::num::ParseFloatError) -> Self {
        Exception::from_error_untraced(&VALUE_ERROR, &err)
    }
}

/// Frame recording for results carrying an exception.
pub trait ResultExt<T> {
    /// Convert the error into an [`Exception`] and record the caller as an
    /// outer frame.
    fn traced(self) -> std::result::Result<T, Exception>;
}

impl<T, E: Into<Exception>> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn traced(self) -> std::result::Result<T, Exception> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.into().traced()),
        }
    }
}

/// Name of the enclosing function, without its module path.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let mut name = type_name_of(f);
        name = name.strip_suffix("::f").unwrap_or(name);
        while let Some(outer) = name.strip_suffix("::{{closure}}") {
            name = outer;
        }
        name.rsplit("::").next().unwrap_or(name)
    }};
}

/// Build an [`Exception`] at the call site, naming the enclosing function.
///
/// ```
/// use cmu_scrub::{exception, VALUE_ERROR};
///
/// let err = exception!(&VALUE_ERROR, "bad value");
/// assert_eq!(err.type_name(), "ValueError");
/// ```
#[macro_export]
macro_rules! exception {
    ($kind:expr) => {
        $crate::Exception::new($kind).in_function($crate::function_name!())
    };
    ($kind:expr, $($arg:expr),+ $(,)?) => {
        $crate::Exception::new($kind)$(.arg($arg))+.in_function($crate::function_name!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_hierarchy() {
        assert!(ZERO_DIVISION_ERROR.is_subtype_of(&ARITHMETIC_ERROR));
        assert!(ZERO_DIVISION_ERROR.is_subtype_of(&EXCEPTION));
        assert!(!ARITHMETIC_ERROR.is_subtype_of(&ZERO_DIVISION_ERROR));
        assert!(PUBLIC_VALUE_ERROR.is_subtype_of(&VALUE_ERROR));
        assert_eq!(KEY_ERROR.base(), Some(&LOOKUP_ERROR));
        assert_eq!(EXCEPTION.base(), None);
    }

    #[test]
    fn test_identity_is_the_declaration() {
        static OWN_VALUE_ERROR: ExceptionType = ExceptionType::new("ValueError", &EXCEPTION);
        assert_ne!(&OWN_VALUE_ERROR, &VALUE_ERROR);
        assert!(!Exception::new(&OWN_VALUE_ERROR).is(&VALUE_ERROR));
        assert!(!Exception::new(&OWN_VALUE_ERROR).is_instance(&VALUE_ERROR));
        assert!(Exception::new(&OWN_VALUE_ERROR).is_instance(&EXCEPTION));
    }

    #[test]
    fn test_is_and_is_instance() {
        let err = Exception::new(&PUBLIC_RUNTIME_ERROR);
        assert!(err.is(&PUBLIC_RUNTIME_ERROR));
        assert!(!err.is(&RUNTIME_ERROR));
        assert!(err.is_instance(&RUNTIME_ERROR));
        assert!(!err.is_instance(&VALUE_ERROR));
    }

    #[test]
    fn test_message_derivation() {
        assert_eq!(Exception::new(&EXCEPTION).message(), "");
        assert_eq!(Exception::with_message(&EXCEPTION, "boom").message(), "boom");
        assert_eq!(Exception::new(&EXCEPTION).opaque_arg(42).message(), "42");
        let many = Exception::new(&EXCEPTION).arg("a").opaque_arg(7);
        assert_eq!(many.message(), "(\"a\", 7)");
    }

    #[test]
    fn test_new_records_caller_frame() {
        let line = line!() + 1;
        let err = Exception::new(&VALUE_ERROR);
        assert_eq!(err.frames().len(), 1);
        assert_eq!(err.frames()[0].line, line);
        assert!(err.frames()[0].file.ends_with("exception.rs"));
        assert_eq!(err.frames()[0].function, UNKNOWN_FUNCTION);
    }

    #[test]
    fn test_traced_prepends_outer_frames() {
        let inner: std::result::Result<(), Exception> = Err(Exception::new(&KEY_ERROR));
        let outer_line = line!() + 1;
        let err = inner.traced().unwrap_err();
        assert_eq!(err.frames().len(), 2);
        assert_eq!(err.frames()[0].line, outer_line);
    }

    #[test]
    fn test_exception_macro_names_function() {
        let err = exception!(&VALUE_ERROR, "boom", "again");
        assert_eq!(err.args().len(), 2);
        assert_eq!(
            err.frames()[0].function,
            "test_exception_macro_names_function"
        );
    }

    #[test]
    fn test_links_and_source() {
        let root = Exception::with_message(&MODULE_NOT_FOUND_ERROR, "No module named 'x'");
        let err = Exception::new(&ARITHMETIC_ERROR).during(root);
        assert!(err.cause().is_none());
        assert_eq!(err.context().map(|c| c.type_name()), Some("ModuleNotFoundError"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("No module named 'x'"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "/secret/path missing");
        let err: Exception = io.into();
        assert!(err.is(&OS_ERROR));
        assert_eq!(err.message(), "/secret/path missing");
        assert!(err.frames().is_empty());
    }

    #[test]
    fn test_from_panic_payloads() {
        let literal = std::panic::catch_unwind(|| panic!("token abc")).unwrap_err();
        assert_eq!(Exception::from_panic(literal.as_ref()).message(), "token abc");

        let id = 7;
        let formatted = std::panic::catch_unwind(|| panic!("row {id}")).unwrap_err();
        let err = Exception::from_panic(formatted.as_ref());
        assert!(err.is_instance(&RUNTIME_ERROR));
        assert_eq!(err.message(), "row 7");

        let other = std::panic::catch_unwind(|| std::panic::panic_any(3u8)).unwrap_err();
        assert!(Exception::from_panic(other.as_ref()).args().is_empty());
    }

    #[test]
    fn test_opaque_equality_is_identity() {
        let a = OpaqueValue::new(1);
        let b = OpaqueValue::new(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
