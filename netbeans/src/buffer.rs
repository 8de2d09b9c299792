//! Editor buffers and the annotations they hold

use std::collections::{BTreeMap, HashMap};

use crate::annotation::{AnnoId, AnnoKind, AnnoTypes, Annotation, Colors, Sernum};
use crate::codec::quote;
use crate::transport::{Cursor, Transport};

/// An editor buffer known to netbeans
#[derive(Debug)]
pub struct Buffer {
    name: String,
    pub buf_id: u32,
    pub registered: bool,
    types: AnnoTypes,
    annotations: BTreeMap<AnnoId, Annotation>,
}

impl Buffer {
    fn new(name: String, buf_id: u32) -> Self {
        Self {
            name,
            buf_id,
            registered: false,
            types: AnnoTypes::default(),
            annotations: BTreeMap::new(),
        }
    }

    /// Full path name of the buffer
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn annotation(&self, id: AnnoId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    fn register(&mut self, tr: &mut Transport) {
        if !self.registered {
            tr.send_cmd(self.buf_id, "editFile", &quote(&self.name));
            tr.send_cmd(self.buf_id, "stopDocumentListen", "");
            self.registered = true;
        }
    }

    /// Place the annotation in the editor unless already placed
    fn place(&mut self, id: AnnoId, colors: &Colors, tr: &mut Transport) {
        self.register(tr);
        let buf_id = self.buf_id;
        let Buffer {
            types, annotations, ..
        } = self;
        if let Some(anno) = annotations.get_mut(&id) {
            if !anno.is_set {
                let type_num = types.type_num(anno.kind(), buf_id, colors, tr);
                tr.send_cmd(
                    buf_id,
                    "addAnno",
                    &format!("{} {} {}/0 -1", anno.sernum, type_num, anno.lnum),
                );
                tr.last_pos = Some(Cursor {
                    buf_id,
                    lnum: anno.lnum,
                    col: 0,
                });
                tr.send_cmd(buf_id, "setDot", &format!("{}/0", anno.lnum));
                anno.is_set = true;
            }
        }
    }

    /// Place all the annotations that are not placed
    pub(crate) fn refresh(&mut self, colors: &Colors, tr: &mut Transport) {
        let ids: Vec<AnnoId> = self.annotations.keys().copied().collect();
        for id in ids {
            self.place(id, colors, tr);
        }
    }

    fn unplace(&mut self, id: AnnoId, tr: &mut Transport) {
        let registered = self.registered;
        if let Some(anno) = self.annotations.get_mut(&id) {
            if registered && anno.is_set {
                tr.send_cmd(self.buf_id, "removeAnno", &anno.sernum.to_string());
            }
            anno.is_set = false;
        }
    }

    fn unplace_all(&mut self, tr: &mut Transport) {
        let ids: Vec<AnnoId> = self.annotations.keys().copied().collect();
        for id in ids {
            self.unplace(id, tr);
        }
    }
}

/// The set of editor buffers, indexed by netbeans buffer number and by name
#[derive(Debug, Default)]
pub struct BufferSet {
    buffers: Vec<Buffer>,
    ids: HashMap<String, u32>,
    bp_index: HashMap<u32, u32>,
    frame_buf: Option<u32>,
    frame_sernum: Option<u32>,
    sernum: Sernum,
    pub colors: Colors,
}

impl BufferSet {
    pub fn new(colors: Colors) -> Self {
        Self {
            colors,
            ..Default::default()
        }
    }

    /// Return the buffer named `name`, creating it when needed
    pub fn get_or_create(&mut self, name: &str) -> &mut Buffer {
        let buf_id = match self.ids.get(name) {
            Some(buf_id) => *buf_id,
            None => {
                let buf_id = self.buffers.len() as u32 + 1;
                self.buffers.push(Buffer::new(name.to_string(), buf_id));
                self.ids.insert(name.to_string(), buf_id);
                buf_id
            }
        };
        &mut self.buffers[buf_id as usize - 1]
    }

    pub fn get(&self, buf_id: u32) -> Option<&Buffer> {
        if buf_id == 0 {
            return None;
        }
        self.buffers.get(buf_id as usize - 1)
    }

    pub fn get_mut(&mut self, buf_id: u32) -> Option<&mut Buffer> {
        if buf_id == 0 {
            return None;
        }
        self.buffers.get_mut(buf_id as usize - 1)
    }

    pub fn find(&self, name: &str) -> Option<&Buffer> {
        self.ids.get(name).and_then(|buf_id| self.get(*buf_id))
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Place the annotations of a buffer that has just been opened
    pub fn refresh(&mut self, buf_id: u32, tr: &mut Transport) {
        let colors = self.colors.clone();
        if let Some(buf) = self.get_mut(buf_id) {
            buf.refresh(&colors, tr);
        }
    }

    /// Add a breakpoint marker.
    ///
    /// Return false when a breakpoint with this id already exists.
    pub fn add_bp(&mut self, bp_id: u32, pathname: &str, lnum: u32, tr: &mut Transport) -> bool {
        if self.bp_index.contains_key(&bp_id) {
            log::error!(target: "nb", "breakpoint {} already exists", bp_id);
            return false;
        }
        let sernum = self.sernum.next();
        let colors = self.colors.clone();
        let id = AnnoId::Breakpoint(bp_id);
        let buf = self.get_or_create(pathname);
        buf.annotations.insert(id, Annotation::new(id, lnum, sernum));
        buf.place(id, &colors, tr);
        let buf_id = buf.buf_id;
        self.bp_index.insert(bp_id, buf_id);
        true
    }

    /// Update the enabled state of a breakpoint marker, the marker is
    /// removed and added back only when its rendering changes.
    ///
    /// Return false when the breakpoint is unknown.
    pub fn update_bp(&mut self, bp_id: u32, disabled: bool, tr: &mut Transport) -> bool {
        let buf_id = match self.bp_index.get(&bp_id) {
            Some(buf_id) => *buf_id,
            None => return false,
        };
        let colors = self.colors.clone();
        let id = AnnoId::Breakpoint(bp_id);
        let buf = match self.get_mut(buf_id) {
            Some(buf) => buf,
            None => return false,
        };
        let changed = match buf.annotations.get(&id) {
            Some(anno) => anno.disabled != disabled,
            None => return false,
        };
        if changed {
            buf.unplace(id, tr);
            if let Some(anno) = buf.annotations.get_mut(&id) {
                anno.disabled = disabled;
            }
        }
        buf.place(id, &colors, tr);
        true
    }

    /// Delete an annotation, return false when it does not exist
    pub fn delete_anno(&mut self, id: AnnoId, tr: &mut Transport) -> bool {
        let buf_id = match id {
            AnnoId::Frame => self.frame_buf.take(),
            AnnoId::Breakpoint(bp_id) => self.bp_index.remove(&bp_id),
        };
        match buf_id.and_then(|buf_id| self.get_mut(buf_id)) {
            Some(buf) => {
                buf.unplace(id, tr);
                buf.annotations.remove(&id).is_some()
            }
            None => false,
        }
    }

    /// Show the frame marker at `lnum` in `pathname`, or hide it when
    /// `location` is None
    pub fn show_frame(&mut self, location: Option<(&str, u32)>, tr: &mut Transport) {
        self.delete_anno(AnnoId::Frame, tr);
        if let Some((pathname, lnum)) = location {
            let sernum = match self.frame_sernum {
                Some(sernum) => sernum,
                None => {
                    let sernum = self.sernum.next();
                    self.frame_sernum = Some(sernum);
                    sernum
                }
            };
            let colors = self.colors.clone();
            let buf = self.get_or_create(pathname);
            buf.annotations
                .insert(AnnoId::Frame, Annotation::new(AnnoId::Frame, lnum, sernum));
            buf.place(AnnoId::Frame, &colors, tr);
            let buf_id = buf.buf_id;
            self.frame_buf = Some(buf_id);
        }
    }

    /// Delete the annotations of `pathname` at `lnum`.
    ///
    /// A None argument matches any buffer or any line. Return the ids of
    /// the deleted annotations.
    pub fn delete_all(
        &mut self,
        pathname: Option<&str>,
        lnum: Option<u32>,
        tr: &mut Transport,
    ) -> Vec<AnnoId> {
        let ids: Vec<AnnoId> = self
            .buffers
            .iter()
            .filter(|buf| pathname.map_or(true, |name| buf.name == name))
            .flat_map(|buf| buf.annotations.values())
            .filter(|anno| lnum.map_or(true, |lnum| anno.lnum == lnum))
            .map(|anno| anno.id)
            .collect();
        ids.into_iter()
            .filter(|id| self.delete_anno(*id, tr))
            .collect()
    }

    /// Remove all the markers from the editor, the annotations are kept
    pub fn remove_all(&mut self, tr: &mut Transport) {
        for buf in self.buffers.iter_mut() {
            buf.unplace_all(tr);
        }
    }

    /// The buffer has been closed in the editor, its markers are gone
    pub fn killed(&mut self, buf_id: u32) -> Option<&Buffer> {
        let buf = self.get_mut(buf_id)?;
        buf.registered = false;
        for anno in buf.annotations.values_mut() {
            anno.is_set = false;
        }
        Some(buf)
    }

    /// Return the line numbers of the enabled breakpoints in `pathname`
    pub fn get_lnum_list(&self, pathname: &str) -> Vec<u32> {
        match self.find(pathname) {
            Some(buf) => buf
                .annotations
                .values()
                .filter(|anno| anno.kind() == AnnoKind::Enabled)
                .map(|anno| anno.lnum)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Return the annotation with this id
    pub fn find_anno(&self, id: AnnoId) -> Option<(&Buffer, &Annotation)> {
        let buf_id = match id {
            AnnoId::Frame => self.frame_buf?,
            AnnoId::Breakpoint(bp_id) => *self.bp_index.get(&bp_id)?,
        };
        let buf = self.get(buf_id)?;
        buf.annotation(id).map(|anno| (buf, anno))
    }
}
