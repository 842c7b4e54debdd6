// Shorthand for return Err(MkvError::new(ErrorKind::Foo))
//
// Usage:
// - err!(Variant)          -> return Err(MkvError::new(ErrorKind::Variant))
// - err!(Variant(Payload)) -> return Err(MkvError::new(ErrorKind::Variant(Payload)))
macro_rules! err {
	($variant:ident) => {
		return Err(crate::error::MkvError::new(
			crate::error::ErrorKind::$variant,
		))
	};
	($variant:ident($payload:expr)) => {
		return Err(crate::error::MkvError::new(
			crate::error::ErrorKind::$variant($payload),
		))
	};
}

// Shorthand for MkvError::new(ErrorKind::Decode("Message"))
//
// Usage:
//
// - decode_err!(Message)
//
// or bail:
//
// - decode_err!(@BAIL Message)
macro_rules! decode_err {
	($reason:literal) => {
		crate::error::MkvError::new(crate::error::ErrorKind::Decode($reason))
	};
	(@BAIL $reason:literal) => {
		return Err(decode_err!($reason))
	};
}

pub(crate) use {decode_err, err};
