/// The tree of gdb variable objects shown in the variables report
///
/// Each watched expression is a root varobj named `varNNN`, its children are
/// named after their parent: `var1.child.grandchild`.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

use crate::records::VarChange;
use crate::types::{tuple_str, Value};

/// Children of a varobj, in gdb order
pub type VarObjList = IndexMap<String, VarObj>;

#[derive(Debug, Clone, PartialEq)]
pub struct VarObj {
    pub name: String,
    pub exp: String,
    pub var_type: String,
    pub value: String,
    pub in_scope: String,
    pub numchild: String,
    pub dynamic: bool,
    pub has_more: Option<String>,
    pub children: VarObjList,
    /// Changed since the last render
    pub chged: bool,
    marker: &'static str,
}

impl VarObj {
    pub fn new(exp: &str) -> Self {
        VarObj {
            name: String::new(),
            exp: exp.to_string(),
            var_type: String::new(),
            value: String::new(),
            in_scope: "true".to_string(),
            numchild: "0".to_string(),
            dynamic: false,
            has_more: None,
            children: VarObjList::new(),
            chged: true,
            marker: "={=}",
        }
    }

    /// Build a varobj from a `-var-create` result or a child tuple
    pub fn from_tuple(tuple: &HashMap<String, Value>) -> Option<Self> {
        let mut varobj = VarObj::new(tuple_str(tuple, "exp").unwrap_or(""));
        varobj.update(tuple)?;
        Some(varobj)
    }

    /// Update the attributes, the name, numchild and type are required
    pub fn update(&mut self, tuple: &HashMap<String, Value>) -> Option<()> {
        let name = tuple_str(tuple, "name")?;
        let numchild = tuple_str(tuple, "numchild")?;
        let var_type = tuple_str(tuple, "type")?;
        self.name = name.to_string();
        self.numchild = numchild.to_string();
        self.var_type = var_type.to_string();
        if let Some(value) = tuple_str(tuple, "value") {
            self.value = value.to_string();
        }
        if let Some(dynamic) = tuple_str(tuple, "dynamic") {
            self.dynamic = dynamic != "0";
        }
        if let Some(has_more) = tuple_str(tuple, "has_more") {
            self.has_more = Some(has_more.to_string());
        }
        Some(())
    }

    fn has_children(&self) -> bool {
        if self.dynamic {
            // -var-update lists new children as dynamic and without
            // has_more, those children may have children.
            self.has_more.as_deref() != Some("0") || !self.children.is_empty()
        } else {
            self.numchild != "0"
        }
    }

    fn collect(
        &mut self,
        parents: &mut BTreeMap<usize, String>,
        lnum: &mut usize,
        output: &mut String,
        indent: usize,
        tab: (usize, usize, usize),
    ) -> bool {
        let mut dirty = false;
        if self.chged {
            self.marker = "={*}";
            self.chged = false;
            dirty = true;
        } else if self.in_scope != "true" {
            self.marker = "={-}";
        } else {
            self.marker = "={=}";
        }

        *lnum += 1;
        let fold = if self.has_children() {
            parents.insert(*lnum, self.name.clone());
            match (self.children.is_empty(), self.dynamic) {
                (false, true) => "(-) ",
                (false, false) => "[-] ",
                (true, true) => "(+) ",
                (true, false) => "[+] ",
            }
        } else {
            " *  "
        };

        let (name_w, type_w, exp_w) = tab;
        let line = if self.dynamic {
            format!(
                "{:indent$}{}{:<name_w$}: {:<exp_w$} {}{}\n",
                "", fold, self.name, self.exp, self.marker, self.value,
            )
        } else {
            format!(
                "{:indent$}{}{:<name_w$}: ({:<type_w$}) {:<exp_w$} {}{}\n",
                "", fold, self.name, self.var_type, self.exp, self.marker, self.value,
            )
        };
        output.push_str(&line);

        if !self.children.is_empty() {
            dirty |= collect_list(&mut self.children, parents, lnum, output, indent + 2);
        }
        dirty
    }
}

fn collect_list(
    list: &mut VarObjList,
    parents: &mut BTreeMap<usize, String>,
    lnum: &mut usize,
    output: &mut String,
    indent: usize,
) -> bool {
    let tab = list.values().fold((0, 0, 0), |tab, v| {
        (
            tab.0.max(v.name.chars().count()),
            tab.1.max(v.var_type.chars().count()),
            tab.2.max(v.exp.chars().count()),
        )
    });
    let mut dirty = false;
    for varobj in list.values_mut() {
        dirty |= varobj.collect(parents, lnum, output, indent, tab);
    }
    dirty
}

/// The root of the tree of varobjs
#[derive(Debug, Default)]
pub struct RootVarObj {
    pub root: VarObjList,
    /// The varobj names that have children, by line number of the last render
    pub parents: BTreeMap<usize, String>,
    pub dirty: bool,
    content: String,
}

impl RootVarObj {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all the varobjs
    pub fn clear(&mut self) {
        if self.root.is_empty() {
            self.dirty = false;
        } else {
            self.root.clear();
            self.parents.clear();
            self.dirty = true;
            self.content.clear();
        }
    }

    pub fn insert(&mut self, varobj: VarObj) {
        self.root.insert(varobj.name.clone(), varobj);
        self.dirty = true;
    }

    /// The varobj named `varNNN.child_1.child_2`
    pub fn leaf(&self, name: &str) -> Option<&VarObj> {
        let parts: Vec<&str> = name.split('.').collect();
        let mut list = &self.root;
        for i in 0..parts.len() {
            let path = parts[..=i].join(".");
            match list.get(&path) {
                Some(varobj) if i == parts.len() - 1 => return Some(varobj),
                Some(varobj) => list = &varobj.children,
                None => {
                    log::warn!(target: "mi", "bad key: \"{}\", cannot find \"{}\" varobj", path, name);
                    return None;
                }
            }
        }
        None
    }

    pub fn leaf_mut(&mut self, name: &str) -> Option<&mut VarObj> {
        let parts: Vec<&str> = name.split('.').collect();
        let mut list = &mut self.root;
        for i in 0..parts.len() - 1 {
            let path = parts[..=i].join(".");
            list = &mut list.get_mut(&path)?.children;
        }
        list.get_mut(name)
    }

    /// Remove the varobj from its parent list
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = match name.rsplit_once('.') {
            None => self.root.shift_remove(name).is_some(),
            Some((parent, _)) => self
                .leaf_mut(parent)
                .map_or(false, |parent| parent.children.shift_remove(name).is_some()),
        };
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// The root varobj of a hierarchical name
    pub fn root_of(&self, name: &str) -> Option<&VarObj> {
        let root_name = name.split('.').next().unwrap_or(name);
        self.root.get(root_name)
    }

    /// Process the `-var-update` changelist
    pub fn update_changelist(&mut self, changelist: &[VarChange]) {
        for change in changelist {
            let varobj = match self.leaf_mut(&change.name) {
                Some(varobj) => varobj,
                None => continue,
            };
            varobj.in_scope = change.in_scope.clone();
            if let Some(value) = &change.value {
                if &varobj.value != value {
                    varobj.value = value.clone();
                    varobj.chged = true;
                }
            }
            if let Some(has_more) = &change.has_more {
                if varobj.has_more.as_ref() != Some(has_more) {
                    varobj.has_more = Some(has_more.clone());
                    varobj.chged = true;
                }
            }
            if let Some(new_num) = change.new_num_children {
                let len = varobj.children.len();
                if new_num > len {
                    for child in change.new_children.iter().filter_map(VarObj::from_tuple) {
                        varobj.children.insert(child.name.clone(), child);
                        varobj.chged = true;
                    }
                } else if new_num < len {
                    varobj.children.truncate(new_num);
                    varobj.chged = true;
                }
            }
        }
        if !changelist.is_empty() {
            self.dirty = true;
        }
    }

    /// Render the tree and rebuild the parents index
    ///
    /// Rendering clears the changed flags, the tree stays dirty when a
    /// varobj was changed so that the next render clears its marker.
    pub fn collect(&mut self) -> String {
        if self.dirty {
            self.parents.clear();
            let mut lnum = 0;
            let mut output = String::new();
            self.dirty = collect_list(&mut self.root, &mut self.parents, &mut lnum, &mut output, 0);
            self.content = output;
        }
        self.content.clone()
    }
}
