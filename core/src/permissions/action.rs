//! Actions and action sets.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AuthzError, Result};

macro_rules! actions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Actions that can be granted on resources.
        ///
        /// The enumeration is closed: names outside it are rejected when a
        /// role definition is loaded.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Action {
            $($variant),+
        }

        impl Action {
            /// Every action, in declaration order.
            pub const ALL: &'static [Action] = &[$(Action::$variant),+];

            /// Wire name of the action.
            pub fn name(self) -> &'static str {
                match self {
                    $(Action::$variant => $name),+
                }
            }

            /// Parse an action from its wire name (case-sensitive).
            pub fn from_name(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Action::$variant),)+
                    _ => Err(AuthzError::UnknownAction(s.to_string())),
                }
            }
        }
    };
}

actions! {
    AddShard => "addShard",
    AdvanceClusterTime => "advanceClusterTime",
    AnyAction => "anyAction",
    AppendOplogNote => "appendOplogNote",
    ApplicationMessage => "applicationMessage",
    AuditLogRotate => "auditLogRotate",
    AuthSchemaUpgrade => "authSchemaUpgrade",
    BypassDocumentValidation => "bypassDocumentValidation",
    ChangeCustomData => "changeCustomData",
    ChangeOwnCustomData => "changeOwnCustomData",
    ChangeOwnPassword => "changeOwnPassword",
    ChangePassword => "changePassword",
    ChangeStream => "changeStream",
    CleanupOrphaned => "cleanupOrphaned",
    CloseAllDatabases => "closeAllDatabases",
    CollMod => "collMod",
    CollStats => "collStats",
    Compact => "compact",
    ConnPoolStats => "connPoolStats",
    ConnPoolSync => "connPoolSync",
    ConvertToCapped => "convertToCapped",
    CpuProfiler => "cpuProfiler",
    CreateCollection => "createCollection",
    CreateDatabase => "createDatabase",
    CreateIndex => "createIndex",
    CreateRole => "createRole",
    CreateUser => "createUser",
    DbHash => "dbHash",
    DbStats => "dbStats",
    DiagLogging => "diagLogging",
    DropAllRolesFromDatabase => "dropAllRolesFromDatabase",
    DropAllUsersFromDatabase => "dropAllUsersFromDatabase",
    DropCollection => "dropCollection",
    DropDatabase => "dropDatabase",
    DropIndex => "dropIndex",
    DropRole => "dropRole",
    DropUser => "dropUser",
    EnableProfiler => "enableProfiler",
    EnableSharding => "enableSharding",
    Find => "find",
    FlushRouterConfig => "flushRouterConfig",
    ForceUuid => "forceUUID",
    Fsync => "fsync",
    GetCmdLineOpts => "getCmdLineOpts",
    GetLog => "getLog",
    GetParameter => "getParameter",
    GetShardMap => "getShardMap",
    GetShardVersion => "getShardVersion",
    GrantRole => "grantRole",
    HostInfo => "hostInfo",
    Impersonate => "impersonate",
    IndexStats => "indexStats",
    Inprog => "inprog",
    Insert => "insert",
    Internal => "internal",
    InvalidateUserCache => "invalidateUserCache",
    KillAnyCursor => "killAnyCursor",
    KillAnySession => "killAnySession",
    KillCursors => "killCursors",
    Killop => "killop",
    ListCachedAndActiveUsers => "listCachedAndActiveUsers",
    ListCollections => "listCollections",
    ListCursors => "listCursors",
    ListDatabases => "listDatabases",
    ListIndexes => "listIndexes",
    ListSessions => "listSessions",
    ListShards => "listShards",
    LogRotate => "logRotate",
    MoveChunk => "moveChunk",
    Netstat => "netstat",
    PlanCacheIndexFilter => "planCacheIndexFilter",
    PlanCacheRead => "planCacheRead",
    PlanCacheWrite => "planCacheWrite",
    ReIndex => "reIndex",
    Remove => "remove",
    RemoveShard => "removeShard",
    RenameCollection => "renameCollection",
    RenameCollectionSameDb => "renameCollectionSameDB",
    RepairDatabase => "repairDatabase",
    ReplSetConfigure => "replSetConfigure",
    ReplSetGetConfig => "replSetGetConfig",
    ReplSetGetStatus => "replSetGetStatus",
    ReplSetHeartbeat => "replSetHeartbeat",
    ReplSetResizeOplog => "replSetResizeOplog",
    ReplSetStateChange => "replSetStateChange",
    Resync => "resync",
    RevokeRole => "revokeRole",
    ServerStatus => "serverStatus",
    SetAuthenticationRestriction => "setAuthenticationRestriction",
    SetFeatureCompatibilityVersion => "setFeatureCompatibilityVersion",
    SetParameter => "setParameter",
    ShardingState => "shardingState",
    Shutdown => "shutdown",
    SplitChunk => "splitChunk",
    SplitVector => "splitVector",
    StorageDetails => "storageDetails",
    Top => "top",
    Touch => "touch",
    Unlock => "unlock",
    Update => "update",
    UseUuid => "useUUID",
    Validate => "validate",
    ViewRole => "viewRole",
    ViewUser => "viewUser",
}

impl Action {
    fn bit(self) -> u128 {
        1u128 << (self as u8)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Action::from_name(&s).map_err(serde::de::Error::custom)
    }
}

/// A set of actions, stored as a bitmask over [`Action`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActionSet {
    bits: u128,
}

impl ActionSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every action in the enumeration, `anyAction` included.
    pub fn all() -> Self {
        Action::ALL.iter().copied().collect()
    }

    pub fn of(actions: &[Action]) -> Self {
        actions.iter().copied().collect()
    }

    /// Parse a list of wire names. Unknown names fail the whole list.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut set = Self::empty();
        for name in names {
            set.add(Action::from_name(name.as_ref())?);
        }
        Ok(set)
    }

    pub fn add(&mut self, action: Action) {
        self.bits |= action.bit();
    }

    pub fn remove(&mut self, action: Action) {
        self.bits &= !action.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Literal membership test. Use [`ActionSet::allows`] when the set is
    /// a held grant and `anyAction` should count as a wildcard.
    pub fn contains(&self, action: Action) -> bool {
        self.bits & action.bit() != 0
    }

    pub fn contains_all(&self, other: &ActionSet) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Whether this set, as a grant, permits `action`.
    pub fn allows(&self, action: Action) -> bool {
        self.contains(Action::AnyAction) || self.contains(action)
    }

    /// Whether this set, as a grant, permits every action in `required`.
    pub fn allows_all(&self, required: &ActionSet) -> bool {
        self.contains(Action::AnyAction) || self.contains_all(required)
    }

    pub fn is_subset_of(&self, other: &ActionSet) -> bool {
        other.contains_all(self)
    }

    pub fn union(&self, other: &ActionSet) -> ActionSet {
        ActionSet {
            bits: self.bits | other.bits,
        }
    }

    pub fn union_with(&mut self, other: &ActionSet) {
        self.bits |= other.bits;
    }

    pub fn subtract(&self, other: &ActionSet) -> ActionSet {
        ActionSet {
            bits: self.bits & !other.bits,
        }
    }

    /// Actions in `self` not permitted by the grant `held`.
    pub fn not_allowed_by(&self, held: &ActionSet) -> ActionSet {
        if held.contains(Action::AnyAction) {
            ActionSet::empty()
        } else {
            self.subtract(held)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.iter().copied().filter(|a| self.contains(*a))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Action::name).collect()
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut set = ActionSet::empty();
        for action in iter {
            set.add(action);
        }
        set
    }
}

impl From<Action> for ActionSet {
    fn from(action: Action) -> Self {
        let mut set = ActionSet::empty();
        set.add(action);
        set
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(", "))
    }
}

impl Serialize for ActionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ActionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        ActionSet::parse(&names).map_err(serde::de::Error::custom)
    }
}
