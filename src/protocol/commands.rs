//! Command recognition, and typed parsers for command arguments.

use crate::protocol::packet::PacketBuf;

pub(crate) mod prelude {
    pub use super::ParseCommand;
    pub use crate::protocol::common::{decode_hex, decode_hex_buf, decode_thread_id};
    pub use crate::protocol::packet::PacketBuf;
}

/// Parse a command's arguments out of its packet body (with the command's
/// prefix already trimmed).
pub trait ParseCommand<'a>: Sized {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self>;
}

/// (used for tests) Bind `$bufname` to a `PacketBuf` over `$body` with
/// `$prefix` already trimmed.
#[cfg(test)]
macro_rules! test_buf {
    ($bufname:ident, $prefix:literal, $body:literal) => {
        let mut $bufname = PacketBuf::new_with_raw_body($body);
        if !$bufname.strip_prefix($prefix) {
            panic!("invalid test");
        }
    };
}

macro_rules! commands {
    ($($mod:ident::$command:ident,)*) => {
        $(
            #[allow(non_snake_case, non_camel_case_types)]
            pub mod $mod;
        )*
        $(pub use $mod::$command;)*
    };
}

commands! {
    _h_upcase::H,
    _t_upcase::T,
    _p::p,
    _p_upcase::P,
    _g_upcase::G,
    _m::m,
    _m_upcase::M,
    breakpoint::BasicBreakpoint,
    _vCont::vCont,
}

/// What a recognized command asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Recognized, but not supported. Replied to with an empty packet.
    Unimplemented,
    /// Superseded by `vCont`. Replied to with an empty packet.
    Deprecated,
    HaltReason,
    SetThread,
    ThreadAlive,
    ReadRegister,
    WriteRegister,
    ReadRegisters,
    WriteRegisters,
    ReadMemory,
    WriteMemory,
    FirstThreadInfo,
    NextThreadInfo,
    Supported,
    Attached,
    TraceStatus,
    CurrentThread,
    Detach,
    Kill,
    VContSupported,
    VCont,
    VKill,
    MustReplyEmpty,
    RemoveBreakpoint,
    AddBreakpoint,
}

// Order Matters: the first entry whose prefix matches the packet body wins, so
// every prefix must come before any shorter prefix of itself (e.g: "vCont?"
// before "vCont", "qC" before "q").
static COMMANDS: &[(&str, CommandKind)] = {
    use CommandKind::*;
    &[
        ("!", Unimplemented),
        ("?", HaltReason),
        ("H", SetThread),
        ("T", ThreadAlive),
        ("i", Unimplemented),
        ("I", Unimplemented),
        ("A", Unimplemented),
        ("bc", Unimplemented),
        ("bs", Unimplemented),
        ("t", Unimplemented),
        ("p", ReadRegister),
        ("P", WriteRegister),
        ("g", ReadRegisters),
        ("G", WriteRegisters),
        ("m", ReadMemory),
        ("M", WriteMemory),
        ("X", Unimplemented),
        ("qfThreadInfo", FirstThreadInfo),
        ("qsThreadInfo", NextThreadInfo),
        ("qSupported", Supported),
        ("qAttached", Attached),
        ("qTStatus", TraceStatus),
        ("qC", CurrentThread),
        ("q", Unimplemented),
        ("Q", Unimplemented),
        ("D", Detach),
        ("d", Unimplemented),
        ("r", Unimplemented),
        ("R", Unimplemented),
        ("k", Kill),
        ("vCont?", VContSupported),
        ("vCont", VCont),
        ("vKill", VKill),
        ("vMustReplyEmpty", MustReplyEmpty),
        ("v", Unimplemented),
        ("z", RemoveBreakpoint),
        ("Z", AddBreakpoint),
        ("b", Deprecated),
        ("B", Deprecated),
        ("c", Deprecated),
        ("C", Deprecated),
        ("s", Deprecated),
        ("S", Deprecated),
    ]
};

/// Find the command a packet body starts with.
///
/// Returns the matched prefix along with the command, or `None` if nothing
/// matches.
pub fn lookup(body: &[u8]) -> Option<(&'static str, CommandKind)> {
    COMMANDS
        .iter()
        .find(|(prefix, _)| body.starts_with(prefix.as_bytes()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_entry_is_shadowed() {
        for (i, (earlier, _)) in COMMANDS.iter().enumerate() {
            for (later, _) in &COMMANDS[i + 1..] {
                assert!(
                    !later.starts_with(earlier),
                    "{:?} can never match, {:?} comes first",
                    later,
                    earlier
                );
            }
        }
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(
            lookup(b"vCont?"),
            Some(("vCont?", CommandKind::VContSupported))
        );
        assert_eq!(lookup(b"vCont;c"), Some(("vCont", CommandKind::VCont)));
        assert_eq!(
            lookup(b"vAttach;1"),
            Some(("v", CommandKind::Unimplemented))
        );
        assert_eq!(lookup(b"qC"), Some(("qC", CommandKind::CurrentThread)));
        assert_eq!(lookup(b"qOffsets"), Some(("q", CommandKind::Unimplemented)));
        assert_eq!(lookup(b"bc"), Some(("bc", CommandKind::Unimplemented)));
        assert_eq!(lookup(b"b9600"), Some(("b", CommandKind::Deprecated)));
        assert_eq!(
            lookup(b"qfThreadInfo"),
            Some(("qfThreadInfo", CommandKind::FirstThreadInfo))
        );
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(lookup(b""), None);
        assert_eq!(lookup(b"xyz"), None);
        assert_eq!(lookup(b"Ffoo"), None);
    }
}
