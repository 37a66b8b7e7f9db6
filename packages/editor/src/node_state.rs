//! # Node State
//!
//! Extensible per-node metadata, kept apart from a node's own typed fields so
//! that new metadata can be added without changing the node's shape.
//!
//! ```text
//! NodeState ──► known:   key → (StateConfig, parsed value)
//!           ──► unknown: key → raw JSON (carried verbatim)
//!           ──► shared:  SharedNodeState of the node *type*
//!                        (key → StateConfig, flat keys)
//! ```
//!
//! A key stays in `unknown` until a `StateConfig` with that key is known to
//! the node type. The next writable copy of the state then parses it and
//! moves it into `known`. Values equal to their config's default are omitted
//! on export.

use crate::node::InstanceId;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Slot of the serialized node envelope holding nested state
pub const NODE_STATE_KEY: &str = "$state";

/// Raw, untyped state as it appears in JSON
pub type StateRecord = Map<String, Value>;

/// Values that can live in a [`NodeState`]
pub trait StateValue: Any + Clone + PartialEq + Serialize + fmt::Debug {}

impl<T: Any + Clone + PartialEq + Serialize + fmt::Debug> StateValue for T {}

type ParseFn<V> = Rc<dyn Fn(Option<&Value>) -> V>;
type UnparseFn<V> = Rc<dyn Fn(&V) -> Value>;
type EqualFn<V> = Rc<dyn Fn(&V, &V) -> bool>;

struct StateConfigInner<V> {
    key: String,
    parse: ParseFn<V>,
    unparse: UnparseFn<V>,
    is_equal: EqualFn<V>,
    default: V,
}

/// Typed contract for one state key.
///
/// The default value is `parse(None)`, computed once when the config is
/// built. Two configs are the same config only if one is a clone of the
/// other; building a second config with an equal key creates a collision.
pub struct StateConfig<V>(Rc<StateConfigInner<V>>);

impl<V> Clone for StateConfig<V> {
    fn clone(&self) -> Self {
        StateConfig(Rc::clone(&self.0))
    }
}

impl<V: StateValue> StateConfig<V> {
    pub fn new(key: impl Into<String>, parse: impl Fn(Option<&Value>) -> V + 'static) -> Self {
        let parse: ParseFn<V> = Rc::new(parse);
        let default = parse(None);
        StateConfig(Rc::new(StateConfigInner {
            key: key.into(),
            parse,
            unparse: Rc::new(default_unparse::<V>),
            is_equal: Rc::new(|a: &V, b: &V| a == b),
            default,
        }))
    }

    pub fn with_unparse(self, unparse: impl Fn(&V) -> Value + 'static) -> Self {
        self.rebuild(|inner| inner.unparse = Rc::new(unparse))
    }

    pub fn with_is_equal(self, is_equal: impl Fn(&V, &V) -> bool + 'static) -> Self {
        self.rebuild(|inner| inner.is_equal = Rc::new(is_equal))
    }

    fn rebuild(self, f: impl FnOnce(&mut StateConfigInner<V>)) -> Self {
        let mut inner = StateConfigInner {
            key: self.0.key.clone(),
            parse: Rc::clone(&self.0.parse),
            unparse: Rc::clone(&self.0.unparse),
            is_equal: Rc::clone(&self.0.is_equal),
            default: self.0.default.clone(),
        };
        f(&mut inner);
        StateConfig(Rc::new(inner))
    }

    pub fn key(&self) -> &str {
        &self.0.key
    }

    pub fn parse(&self, raw: Option<&Value>) -> V {
        (self.0.parse)(raw)
    }

    pub fn unparse(&self, value: &V) -> Value {
        (self.0.unparse)(value)
    }

    pub fn is_equal(&self, a: &V, b: &V) -> bool {
        (self.0.is_equal)(a, b)
    }

    pub fn default_value(&self) -> &V {
        &self.0.default
    }

    pub(crate) fn erased(&self) -> Rc<dyn AnyStateConfig> {
        self.0.clone()
    }

    /// Whether `other` is this very config
    pub(crate) fn is(&self, other: &Rc<dyn AnyStateConfig>) -> bool {
        same_config(&self.erased(), other)
    }
}

impl<V> fmt::Debug for StateConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateConfig").field("key", &self.0.key).finish()
    }
}

/// Type-erased view of a [`StateConfig`]
pub(crate) trait AnyStateConfig {
    fn key(&self) -> &str;
    fn parse_any(&self, raw: Option<&Value>) -> Rc<dyn Any>;
    fn unparse_any(&self, value: &dyn Any) -> Value;
    fn default_any(&self) -> Rc<dyn Any>;
    fn is_default(&self, value: &dyn Any) -> bool;
}

impl<V: StateValue> AnyStateConfig for StateConfigInner<V> {
    fn key(&self) -> &str {
        &self.key
    }

    fn parse_any(&self, raw: Option<&Value>) -> Rc<dyn Any> {
        Rc::new((self.parse)(raw))
    }

    fn unparse_any(&self, value: &dyn Any) -> Value {
        value
            .downcast_ref::<V>()
            .map(|v| (self.unparse)(v))
            .unwrap_or(Value::Null)
    }

    fn default_any(&self) -> Rc<dyn Any> {
        Rc::new(self.default.clone())
    }

    fn is_default(&self, value: &dyn Any) -> bool {
        value
            .downcast_ref::<V>()
            .map_or(false, |v| (self.is_equal)(v, &self.default))
    }
}

/// Serialize through serde. A value serde rejects (a map with non-string
/// keys, a float that is not finite) is exported as `null`.
fn default_unparse<V: Serialize>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(error = %err, "State value could not be serialized, exporting null");
        Value::Null
    })
}

pub(crate) fn same_config(a: &Rc<dyn AnyStateConfig>, b: &Rc<dyn AnyStateConfig>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const u8, Rc::as_ptr(b) as *const u8)
}

/// State configuration shared by every instance (and every version) of one
/// node type
#[derive(Default)]
pub struct SharedNodeState {
    config_map: HashMap<String, Rc<dyn AnyStateConfig>>,
    flat_keys: HashSet<String>,
}

pub type SharedNodeStateRef = Rc<RefCell<SharedNodeState>>;

impl SharedNodeState {
    pub(crate) fn register(&mut self, config: Rc<dyn AnyStateConfig>, flat: bool) {
        let key = config.key().to_string();
        if flat {
            self.flat_keys.insert(key.clone());
        }
        self.config_map.insert(key, config);
    }

    /// Record `config` unless its key is already configured
    pub(crate) fn ensure(&mut self, config: Rc<dyn AnyStateConfig>) {
        self.config_map
            .entry(config.key().to_string())
            .or_insert(config);
    }

    pub(crate) fn get(&self, key: &str) -> Option<Rc<dyn AnyStateConfig>> {
        self.config_map.get(key).cloned()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.config_map.contains_key(key)
    }

    pub fn is_flat(&self, key: &str) -> bool {
        self.flat_keys.contains(key)
    }

    pub fn flat_keys(&self) -> impl Iterator<Item = &String> {
        self.flat_keys.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.config_map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for SharedNodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedNodeState")
            .field("keys", &self.keys())
            .field("flat_keys", &self.flat_keys)
            .finish()
    }
}

#[derive(Clone)]
struct KnownValue {
    config: Rc<dyn AnyStateConfig>,
    value: Rc<dyn Any>,
}

/// Per-node state bag
#[derive(Clone)]
pub struct NodeState {
    owner: InstanceId,
    known: HashMap<String, KnownValue>,
    unknown: Option<StateRecord>,
    shared: SharedNodeStateRef,
    size: usize,
}

impl NodeState {
    pub(crate) fn new(owner: InstanceId, shared: SharedNodeStateRef) -> Self {
        Self::from_parts(owner, shared, None, HashMap::new(), None)
    }

    fn from_parts(
        owner: InstanceId,
        shared: SharedNodeStateRef,
        unknown: Option<StateRecord>,
        known: HashMap<String, KnownValue>,
        size: Option<usize>,
    ) -> Self {
        let computed = {
            let config_map = shared.borrow();
            debug_assert!(
                known.keys().all(|key| config_map.has_key(key)),
                "NodeState: shared config map is missing a known state key"
            );
            compute_size(&config_map, unknown.as_ref(), &known)
        };
        debug_assert!(
            size.map_or(true, |size| size == computed),
            "NodeState: size != computed size ({:?} != {})",
            size,
            computed
        );
        Self {
            owner,
            known,
            unknown,
            shared,
            size: computed,
        }
    }

    /// Copy-on-write: the state itself if `owner` already owns it, otherwise
    /// a copy bound to `owner` with newly recognized keys promoted.
    pub(crate) fn get_writable(self: &Rc<Self>, owner: InstanceId) -> Rc<Self> {
        if self.owner == owner {
            return Rc::clone(self);
        }
        let mut known = self.known.clone();
        let unknown = parse_and_prune(&self.shared.borrow(), &mut known, self.unknown.as_ref());
        Rc::new(Self::from_parts(
            owner,
            Rc::clone(&self.shared),
            unknown,
            known,
            Some(self.size),
        ))
    }

    /// Read a value. Unknown raw values with this key are parsed on the fly
    /// but stay unknown until the next write.
    pub fn get_value<V: StateValue>(&self, config: &StateConfig<V>) -> V {
        if let Some(known) = self.known.get(config.key()) {
            if let Some(value) = (*known.value).downcast_ref::<V>() {
                return value.clone();
            }
        }
        self.shared.borrow_mut().ensure(config.erased());
        match self.unknown.as_ref().and_then(|unknown| unknown.get(config.key())) {
            Some(raw) => config.parse(Some(raw)),
            None => config.default_value().clone(),
        }
    }

    pub fn set_value<V: StateValue>(&mut self, config: &StateConfig<V>, value: V) {
        self.update_from_known(config.erased(), Rc::new(value));
    }

    pub(crate) fn update_from_known(&mut self, config: Rc<dyn AnyStateConfig>, value: Rc<dyn Any>) {
        let key = config.key().to_string();
        self.shared.borrow_mut().ensure(Rc::clone(&config));
        let in_unknown = self
            .unknown
            .as_ref()
            .map_or(false, |unknown| unknown.contains_key(&key));
        if !self.known.contains_key(&key) && !in_unknown {
            self.size += 1;
        }
        if let Some(unknown) = self.unknown.as_mut() {
            unknown.remove(&key);
            if unknown.is_empty() {
                self.unknown = None;
            }
        }
        self.known.insert(key, KnownValue { config, value });
    }

    /// Set a raw value, parsing it if the key is configured for this type
    pub fn update_from_unknown(&mut self, key: &str, value: Value) {
        let config = self.shared.borrow().get(key);
        match config {
            Some(config) => {
                let parsed = config.parse_any(Some(&value));
                self.update_from_known(config, parsed);
            }
            None => {
                let unknown = self.unknown.get_or_insert_with(Map::new);
                if !unknown.contains_key(key) {
                    self.size += 1;
                }
                unknown.insert(key.to_string(), value);
            }
        }
    }

    /// Replace the whole state from a raw record: every known key returns to
    /// its default, unknown keys are dropped, then the record is applied.
    pub fn update_from_json(&mut self, record: Option<StateRecord>) {
        for entry in self.known.values_mut() {
            entry.value = entry.config.default_any();
        }
        self.size = self.known.len();
        self.unknown = None;
        if let Some(record) = record {
            for (key, value) in record {
                self.update_from_unknown(&key, value);
            }
        }
    }

    /// Export: flat keys at the top level, everything else nested under
    /// [`NODE_STATE_KEY`]. Values equal to their default are omitted.
    pub fn to_json(&self) -> StateRecord {
        let mut state = self.unknown.clone().unwrap_or_default();
        for (key, entry) in &self.known {
            if entry.config.is_default(&*entry.value) {
                state.remove(key);
            } else {
                state.insert(key.clone(), entry.config.unparse_any(&*entry.value));
            }
        }
        let mut flat = Map::new();
        for key in self.shared.borrow().flat_keys() {
            if let Some(value) = state.remove(key) {
                flat.insert(key.clone(), value);
            }
        }
        if !state.is_empty() {
            flat.insert(NODE_STATE_KEY.to_string(), Value::Object(state));
        }
        flat
    }

    /// Number of distinct keys across known and unknown state
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn unknown_state(&self) -> Option<&StateRecord> {
        self.unknown.as_ref()
    }

    pub fn known_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.known.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.known.contains_key(key)
    }

    pub fn shared(&self) -> &SharedNodeStateRef {
        &self.shared
    }

    /// Config recorded for `key` on this node type, if any
    pub(crate) fn configured(&self, key: &str) -> Option<Rc<dyn AnyStateConfig>> {
        self.shared.borrow().get(key)
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: BTreeMap<&str, Value> = self
            .known
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.config.unparse_any(&*entry.value)))
            .collect();
        f.debug_struct("NodeState")
            .field("size", &self.size)
            .field("known", &known)
            .field("unknown", &self.unknown)
            .finish()
    }
}

/// Whether two optional states export identically
pub fn states_equivalent(a: Option<&NodeState>, b: Option<&NodeState>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if std::ptr::eq(a, b) => true,
        (Some(a), Some(b)) if a.size != b.size => false,
        _ => {
            let export = |state: Option<&NodeState>| state.map(NodeState::to_json).unwrap_or_default();
            export(a) == export(b)
        }
    }
}

fn compute_size(
    shared: &SharedNodeState,
    unknown: Option<&StateRecord>,
    known: &HashMap<String, KnownValue>,
) -> usize {
    let mut size = known.len();
    if let Some(unknown) = unknown {
        for key in unknown.keys() {
            if !shared.has_key(key) || !known.contains_key(key) {
                size += 1;
            }
        }
    }
    size
}

/// Promote recognized unknown keys into `known`; return what stays unknown
fn parse_and_prune(
    shared: &SharedNodeState,
    known: &mut HashMap<String, KnownValue>,
    unknown: Option<&StateRecord>,
) -> Option<StateRecord> {
    let mut next_unknown: Option<StateRecord> = None;
    for (key, value) in unknown.into_iter().flatten() {
        match shared.get(key) {
            Some(config) => {
                if !known.contains_key(key) {
                    let parsed = config.parse_any(Some(value));
                    known.insert(key.clone(), KnownValue { config, value: parsed });
                }
            }
            None => {
                next_unknown
                    .get_or_insert_with(Map::new)
                    .insert(key.clone(), value.clone());
            }
        }
    }
    next_unknown
}
