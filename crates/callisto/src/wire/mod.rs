/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

/// Binds content types to their `msg_type` strings.
macro_rules! message_types {
    ($($content:ty => $name:literal),* $(,)?) => {
        $(
            impl $crate::wire::jupyter_message::MessageType for $content {
                fn message_type() -> String {
                    String::from($name)
                }
            }
        )*
    };
}

pub mod control;
pub mod header;
pub mod iopub;
pub mod jupyter_message;
pub mod shell;
pub mod status;
pub mod stdin;
pub mod wire_message;
