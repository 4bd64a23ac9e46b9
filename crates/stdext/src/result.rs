//
// result.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

pub trait ResultExt<T, E> {
    /// Calls the provided closure with the contained error (if [`Err`]).
    ///
    /// Consumes the Result, unlike `inspect_err()` which propagates it and
    /// still requires you to handle the Result in some way.
    fn on_err<F: FnOnce(E)>(self, f: F);

    /// Logs the contained error (if [`Err`]) with some context and drops it.
    fn log_err(self, context: &str)
    where
        E: std::fmt::Display;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn on_err<F: FnOnce(E)>(self, f: F) {
        if let Err(e) = self {
            f(e);
        }
    }

    fn log_err(self, context: &str)
    where
        E: std::fmt::Display,
    {
        self.on_err(|err| log::error!("{context}: {err}"));
    }
}

/// Logs the error of a `Result` expression, if any, at the call site.
#[macro_export]
macro_rules! log_error {
    ($expr:expr) => {
        if let Err(err) = $expr {
            log::error!("{}", err);
        }
    };
}
