//! Editor markers: breakpoint and frame annotations

use crate::transport::Transport;

/// Identity of an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnoId {
    /// The singleton frame marker
    Frame,
    /// A breakpoint marker, keyed by the gdb breakpoint number
    Breakpoint(u32),
}

impl std::fmt::Display for AnnoId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AnnoId::Frame => write!(f, "frame"),
            AnnoId::Breakpoint(id) => write!(f, "{}", id),
        }
    }
}

/// How an annotation is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnoKind {
    Enabled,
    Disabled,
    Frame,
}

/// Annotation serial numbers are unique within a session
#[derive(Debug)]
pub struct Sernum(u32);

impl Default for Sernum {
    fn default() -> Self {
        Sernum(1)
    }
}

impl Sernum {
    pub fn next(&mut self) -> u32 {
        let sernum = self.0;
        self.0 += 1;
        sernum
    }
}

/// Marker colors, either color names or legacy numeric colors
#[derive(Debug, Clone)]
pub struct Colors {
    pub enabled: String,
    pub disabled: String,
    pub frame: String,
}

impl Colors {
    /// Numeric colors understood by editors older than netbeans 2.5
    pub fn legacy() -> Self {
        Self {
            enabled: "802287".into(),
            disabled: "4190027".into(),
            frame: "15710005".into(),
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            enabled: "Cyan".into(),
            disabled: "Green".into(),
            frame: "Magenta".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: AnnoId,
    pub lnum: u32,
    pub disabled: bool,
    pub sernum: u32,
    pub is_set: bool,
}

impl Annotation {
    pub fn new(id: AnnoId, lnum: u32, sernum: u32) -> Self {
        Self {
            id,
            lnum,
            disabled: false,
            sernum,
            is_set: false,
        }
    }

    pub fn kind(&self) -> AnnoKind {
        match self.id {
            AnnoId::Frame => AnnoKind::Frame,
            AnnoId::Breakpoint(_) if self.disabled => AnnoKind::Disabled,
            AnnoId::Breakpoint(_) => AnnoKind::Enabled,
        }
    }
}

/// Marker types defined in one editor buffer.
///
/// Types are registered lazily with `defineAnnoType`, the disabled
/// breakpoint type always follows the enabled one.
#[derive(Debug, Default)]
pub struct AnnoTypes {
    type_num: u32,
    bp_tnum: Option<u32>,
    frame_tnum: Option<u32>,
}

impl AnnoTypes {
    /// Return the marker type number of `kind`, defining it when needed
    pub fn type_num(
        &mut self,
        kind: AnnoKind,
        buf_id: u32,
        colors: &Colors,
        tr: &mut Transport,
    ) -> u32 {
        match kind {
            AnnoKind::Enabled | AnnoKind::Disabled => {
                let bp_tnum = match self.bp_tnum {
                    Some(tnum) => tnum,
                    None => {
                        let tnum = self.type_num + 1;
                        self.type_num += 2;
                        tr.send_cmd(
                            buf_id,
                            "defineAnnoType",
                            &format!("{} \"bpEnabled\" \"\" \"bp\" none {}", tnum, colors.enabled),
                        );
                        tr.send_cmd(
                            buf_id,
                            "defineAnnoType",
                            &format!(
                                "{} \"bpDisabled\" \"\" \"bp\" none {}",
                                tnum + 1,
                                colors.disabled
                            ),
                        );
                        self.bp_tnum = Some(tnum);
                        tnum
                    }
                };
                if kind == AnnoKind::Disabled {
                    bp_tnum + 1
                } else {
                    bp_tnum
                }
            }
            AnnoKind::Frame => match self.frame_tnum {
                Some(tnum) => tnum,
                None => {
                    self.type_num += 1;
                    let tnum = self.type_num;
                    tr.send_cmd(
                        buf_id,
                        "defineAnnoType",
                        &format!("{} \"frame\" \"\" \"=>\" none {}", tnum, colors.frame),
                    );
                    self.frame_tnum = Some(tnum);
                    tnum
                }
            },
        }
    }
}
