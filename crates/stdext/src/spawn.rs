//
// spawn.rs
//
// Copyright (C) 2023 Posit Software, PBC. All rights reserved.
//
//

/// Spawns a named thread.
#[macro_export]
macro_rules! spawn {
    ($name:expr, $body:expr) => {{
        std::thread::Builder::new()
            .name(String::from($name))
            .spawn($body)
            .expect("Can't spawn thread")
    }};
}
