use super::prelude::*;

/// `vCont[;action[:thread-id]]...`
#[derive(Debug)]
pub struct vCont<'a> {
    pub actions: Actions<'a>,
}

impl<'a> ParseCommand<'a> for vCont<'a> {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        Some(vCont {
            actions: Actions(buf.as_body()),
        })
    }
}

/// A lazily evaluated iterator over the actions specified in a vCont packet.
#[derive(Debug, Clone, Copy)]
pub struct Actions<'a>(&'a [u8]);

impl<'a> Actions<'a> {
    pub fn iter(&self) -> impl Iterator<Item = VContAction> + 'a {
        self.0
            .split(|&b| b == b';')
            .filter(|act| !act.is_empty())
            .map(VContAction::from_slice)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct VContAction {
    /// `Err` carries the action letter, if the action could not be parsed.
    pub kind: Result<VContKind, u8>,
    pub thread: Option<i32>,
}

impl VContAction {
    fn from_slice(act: &[u8]) -> VContAction {
        let mut s = act.splitn(2, |&b| b == b':');
        let kind = s.next().unwrap_or_default();
        let thread = s.next().and_then(|t| decode_thread_id(t).ok());

        VContAction {
            kind: VContKind::from_slice(kind)
                .ok_or(kind.first().copied().unwrap_or(0)),
            thread,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum VContKind {
    Continue,
    ContinueWithSig(u8),
    RangeStep(u32, u32),
    Step,
    StepWithSig(u8),
    Stop,
}

impl VContKind {
    fn from_slice(s: &[u8]) -> Option<VContKind> {
        use self::VContKind::*;

        let (&letter, arg) = s.split_first()?;
        let res = match letter {
            b'c' => Continue,
            b'C' => ContinueWithSig(decode_hex(arg).ok()?),
            b's' => Step,
            b'S' => StepWithSig(decode_hex(arg).ok()?),
            b't' => Stop,
            b'r' => {
                let mut range = arg.split(|&b| b == b',');
                let start = decode_hex(range.next()?).ok()?;
                let end = decode_hex(range.next()?).ok()?;
                RangeStep(start, end)
            }
            _ => return None,
        };

        Some(res)
    }

    /// `c`/`C`/`s`/`S`, as opposed to stop or range-step requests.
    pub fn is_resume(&self) -> bool {
        matches!(
            self,
            VContKind::Continue
                | VContKind::ContinueWithSig(_)
                | VContKind::Step
                | VContKind::StepWithSig(_)
        )
    }

    pub fn is_step(&self) -> bool {
        matches!(self, VContKind::Step | VContKind::StepWithSig(_))
    }
}
