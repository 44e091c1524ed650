//! Built-in role definitions.

use std::fmt;

use super::{Action, ActionSet, PrivilegeSet, ResourcePattern, Role, RoleName};
use crate::namespace::Namespace;

pub const ADMIN_DB: &str = "admin";

use super::Action::*;

const READ_ACTIONS: &[Action] = &[
    ChangeStream,
    CollStats,
    DbHash,
    DbStats,
    Find,
    KillCursors,
    ListCollections,
    ListIndexes,
    PlanCacheRead,
];

const READ_WRITE_EXTRA_ACTIONS: &[Action] = &[
    ConvertToCapped,
    CreateCollection,
    CreateIndex,
    DropCollection,
    DropIndex,
    Insert,
    Remove,
    RenameCollectionSameDb,
    Update,
];

const USER_ADMIN_ACTIONS: &[Action] = &[
    ChangeCustomData,
    ChangePassword,
    CreateRole,
    CreateUser,
    DropRole,
    DropUser,
    GrantRole,
    RevokeRole,
    SetAuthenticationRestriction,
    ViewRole,
    ViewUser,
];

const DB_ADMIN_ACTIONS: &[Action] = &[
    BypassDocumentValidation,
    CollMod,
    CollStats,
    Compact,
    ConvertToCapped,
    CreateCollection,
    CreateIndex,
    DbStats,
    DropCollection,
    DropDatabase,
    DropIndex,
    EnableProfiler,
    ListCollections,
    ListIndexes,
    PlanCacheIndexFilter,
    PlanCacheRead,
    PlanCacheWrite,
    ReIndex,
    RenameCollectionSameDb,
    RepairDatabase,
    StorageDetails,
    Validate,
];

/// Extra actions `dbAdmin` holds on `system.profile` on top of read.
const PROFILE_ADMIN_ACTIONS: &[Action] = &[ConvertToCapped, CreateCollection, DropCollection];

const CLUSTER_MONITOR_CLUSTER_ACTIONS: &[Action] = &[
    ConnPoolStats,
    GetCmdLineOpts,
    GetLog,
    GetParameter,
    GetShardMap,
    HostInfo,
    Inprog,
    ListDatabases,
    ListSessions,
    ListShards,
    Netstat,
    ReplSetGetConfig,
    ReplSetGetStatus,
    ServerStatus,
    ShardingState,
    Top,
];

const CLUSTER_MONITOR_DB_ACTIONS: &[Action] = &[CollStats, DbStats, GetShardVersion, IndexStats];

const HOST_MANAGER_CLUSTER_ACTIONS: &[Action] = &[
    ApplicationMessage,
    ConnPoolSync,
    CpuProfiler,
    DiagLogging,
    FlushRouterConfig,
    Fsync,
    InvalidateUserCache,
    KillAnyCursor,
    KillAnySession,
    Killop,
    LogRotate,
    Resync,
    SetParameter,
    Shutdown,
    Touch,
    Unlock,
];

const HOST_MANAGER_DB_ACTIONS: &[Action] = &[KillCursors, RepairDatabase];

const CLUSTER_MANAGER_CLUSTER_ACTIONS: &[Action] = &[
    AddShard,
    AppendOplogNote,
    ApplicationMessage,
    CleanupOrphaned,
    FlushRouterConfig,
    ListSessions,
    ListShards,
    RemoveShard,
    ReplSetConfigure,
    ReplSetGetConfig,
    ReplSetGetStatus,
    ReplSetStateChange,
    Resync,
    SetFeatureCompatibilityVersion,
];

const CLUSTER_MANAGER_DB_ACTIONS: &[Action] = &[EnableSharding, MoveChunk, SplitChunk, SplitVector];

const BACKUP_CLUSTER_ACTIONS: &[Action] = &[AppendOplogNote, GetParameter, ListDatabases];

const RESTORE_NORMAL_ACTIONS: &[Action] = &[
    BypassDocumentValidation,
    ChangeCustomData,
    ChangePassword,
    CollMod,
    ConvertToCapped,
    CreateCollection,
    CreateIndex,
    CreateRole,
    CreateUser,
    DropCollection,
    DropRole,
    DropUser,
    GrantRole,
    Insert,
    RevokeRole,
    ViewRole,
    ViewUser,
];

/// Built-in roles, seeded at startup and never modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRole {
    /// Read-only access to all non-system collections in a database
    Read,
    /// Read and write access to all non-system collections in a database
    ReadWrite,
    /// Schema and profiling management for a database
    DbAdmin,
    /// User and role management for a database
    UserAdmin,
    /// Everything the other database roles grant
    DbOwner,
    ReadAnyDatabase,
    ReadWriteAnyDatabase,
    UserAdminAnyDatabase,
    DbAdminAnyDatabase,
    EnableSharding,
    /// Cluster-wide read-only monitoring
    ClusterMonitor,
    HostManager,
    ClusterManager,
    /// Union of the three cluster roles
    ClusterAdmin,
    Backup,
    Restore,
    /// Superuser, minus internal-only actions
    Root,
    /// Cluster-internal principal; holds every action everywhere
    System,
}

impl BuiltinRole {
    pub const ALL: &'static [BuiltinRole] = &[
        BuiltinRole::Read,
        BuiltinRole::ReadWrite,
        BuiltinRole::DbAdmin,
        BuiltinRole::UserAdmin,
        BuiltinRole::DbOwner,
        BuiltinRole::ReadAnyDatabase,
        BuiltinRole::ReadWriteAnyDatabase,
        BuiltinRole::UserAdminAnyDatabase,
        BuiltinRole::DbAdminAnyDatabase,
        BuiltinRole::EnableSharding,
        BuiltinRole::ClusterMonitor,
        BuiltinRole::HostManager,
        BuiltinRole::ClusterManager,
        BuiltinRole::ClusterAdmin,
        BuiltinRole::Backup,
        BuiltinRole::Restore,
        BuiltinRole::Root,
        BuiltinRole::System,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinRole::Read => "read",
            BuiltinRole::ReadWrite => "readWrite",
            BuiltinRole::DbAdmin => "dbAdmin",
            BuiltinRole::UserAdmin => "userAdmin",
            BuiltinRole::DbOwner => "dbOwner",
            BuiltinRole::ReadAnyDatabase => "readAnyDatabase",
            BuiltinRole::ReadWriteAnyDatabase => "readWriteAnyDatabase",
            BuiltinRole::UserAdminAnyDatabase => "userAdminAnyDatabase",
            BuiltinRole::DbAdminAnyDatabase => "dbAdminAnyDatabase",
            BuiltinRole::EnableSharding => "enableSharding",
            BuiltinRole::ClusterMonitor => "clusterMonitor",
            BuiltinRole::HostManager => "hostManager",
            BuiltinRole::ClusterManager => "clusterManager",
            BuiltinRole::ClusterAdmin => "clusterAdmin",
            BuiltinRole::Backup => "backup",
            BuiltinRole::Restore => "restore",
            BuiltinRole::Root => "root",
            BuiltinRole::System => "__system",
        }
    }

    /// Roles that only exist in the `admin` database.
    pub fn is_admin_only(&self) -> bool {
        !matches!(
            self,
            BuiltinRole::Read
                | BuiltinRole::ReadWrite
                | BuiltinRole::DbAdmin
                | BuiltinRole::UserAdmin
                | BuiltinRole::DbOwner
        )
    }

    /// Look up the built-in role a name refers to, if any. Database-scoped
    /// built-ins exist in every database, the rest only in `admin`.
    pub fn lookup(name: &RoleName) -> Option<Self> {
        let role = BuiltinRole::ALL
            .iter()
            .copied()
            .find(|r| r.name() == name.role)?;
        if role.is_admin_only() && name.db != ADMIN_DB {
            return None;
        }
        Some(role)
    }

    pub fn is_builtin(name: &RoleName) -> bool {
        Self::lookup(name).is_some()
    }

    /// Roles this built-in inherits from, instantiated in `db`.
    pub fn parents(&self, db: &str) -> Vec<RoleName> {
        let names: &[BuiltinRole] = match self {
            BuiltinRole::DbOwner => &[
                BuiltinRole::ReadWrite,
                BuiltinRole::DbAdmin,
                BuiltinRole::UserAdmin,
            ],
            BuiltinRole::ClusterAdmin => &[
                BuiltinRole::ClusterManager,
                BuiltinRole::ClusterMonitor,
                BuiltinRole::HostManager,
            ],
            _ => &[],
        };
        names
            .iter()
            .map(|r| RoleName::new(r.name(), db))
            .collect()
    }

    /// Direct privileges of this role when instantiated in `db`.
    /// Inherited privileges come from [`BuiltinRole::parents`].
    pub fn privileges(&self, db: &str) -> PrivilegeSet {
        let mut set = PrivilegeSet::new();
        let read_write: Vec<Action> = [READ_ACTIONS, READ_WRITE_EXTRA_ACTIONS].concat();

        match self {
            BuiltinRole::Read => {
                set.add_actions(ResourcePattern::for_db(db), READ_ACTIONS);
                for coll in ["system.indexes", "system.js", "system.namespaces"] {
                    set.add_actions(exact(db, coll), READ_ACTIONS);
                }
                set.add_actions(buckets_in(db), READ_ACTIONS);
            }
            BuiltinRole::ReadWrite => {
                set.add_actions(ResourcePattern::for_db(db), &read_write);
                set.add_actions(exact(db, "system.js"), &read_write);
                for coll in ["system.indexes", "system.namespaces"] {
                    set.add_actions(exact(db, coll), READ_ACTIONS);
                }
                set.add_actions(buckets_in(db), &read_write);
            }
            BuiltinRole::DbAdmin => {
                set.add_actions(ResourcePattern::for_db(db), DB_ADMIN_ACTIONS);
                for coll in ["system.indexes", "system.namespaces", "system.profile"] {
                    set.add_actions(exact(db, coll), READ_ACTIONS);
                }
                set.add_actions(exact(db, "system.profile"), PROFILE_ADMIN_ACTIONS);
                set.add_actions(buckets_in(db), DB_ADMIN_ACTIONS);
            }
            BuiltinRole::UserAdmin => {
                set.add_actions(ResourcePattern::for_db(db), USER_ADMIN_ACTIONS);
            }
            BuiltinRole::DbOwner => {}
            BuiltinRole::ReadAnyDatabase => {
                set.add_actions(ResourcePattern::AnyNormalResource, READ_ACTIONS);
                set.add_actions(ResourcePattern::ClusterResource, &[ListDatabases]);
                for coll in ["system.indexes", "system.js", "system.namespaces"] {
                    set.add_actions(ResourcePattern::for_collection_name(coll), READ_ACTIONS);
                }
                for internal_db in ["config", "local"] {
                    set.add_actions(ResourcePattern::for_db(internal_db), READ_ACTIONS);
                }
                set.add_actions(ResourcePattern::AnySystemBuckets, READ_ACTIONS);
            }
            BuiltinRole::ReadWriteAnyDatabase => {
                set.add_actions(ResourcePattern::AnyNormalResource, &read_write);
                set.add_actions(ResourcePattern::ClusterResource, &[ListDatabases]);
                set.add_actions(ResourcePattern::for_collection_name("system.js"), &read_write);
                for coll in ["system.indexes", "system.namespaces"] {
                    set.add_actions(ResourcePattern::for_collection_name(coll), READ_ACTIONS);
                }
                set.add_actions(ResourcePattern::for_db("config"), &read_write);
                set.add_actions(ResourcePattern::for_db("local"), READ_ACTIONS);
                set.add_actions(ResourcePattern::AnySystemBuckets, &read_write);
            }
            BuiltinRole::UserAdminAnyDatabase => {
                set.add_actions(ResourcePattern::AnyNormalResource, USER_ADMIN_ACTIONS);
                set.add_actions(
                    ResourcePattern::ClusterResource,
                    &[AuthSchemaUpgrade, InvalidateUserCache, ListDatabases],
                );
                let user_store_actions = [READ_ACTIONS, &[CreateIndex, DropIndex][..]].concat();
                set.add_actions(
                    ResourcePattern::for_collection_name("system.users"),
                    &user_store_actions,
                );
                set.add_actions(exact(ADMIN_DB, "system.roles"), &user_store_actions);
                set.add_actions(exact(ADMIN_DB, "system.version"), &[Find]);
            }
            BuiltinRole::DbAdminAnyDatabase => {
                set.add_actions(ResourcePattern::AnyNormalResource, DB_ADMIN_ACTIONS);
                set.add_actions(ResourcePattern::ClusterResource, &[ListDatabases]);
                for coll in ["system.indexes", "system.namespaces", "system.profile"] {
                    set.add_actions(ResourcePattern::for_collection_name(coll), READ_ACTIONS);
                }
                set.add_actions(
                    ResourcePattern::for_collection_name("system.profile"),
                    PROFILE_ADMIN_ACTIONS,
                );
                set.add_actions(ResourcePattern::AnySystemBuckets, DB_ADMIN_ACTIONS);
            }
            BuiltinRole::EnableSharding => {
                set.add_actions(ResourcePattern::AnyNormalResource, &[EnableSharding]);
            }
            BuiltinRole::ClusterMonitor => {
                set.add_actions(
                    ResourcePattern::ClusterResource,
                    CLUSTER_MONITOR_CLUSTER_ACTIONS,
                );
                set.add_actions(
                    ResourcePattern::AnyNormalResource,
                    CLUSTER_MONITOR_DB_ACTIONS,
                );
                let with_find = [CLUSTER_MONITOR_DB_ACTIONS, &[Find][..]].concat();
                for internal_db in ["config", "local"] {
                    set.add_actions(ResourcePattern::for_db(internal_db), &with_find);
                }
                set.add_actions(ResourcePattern::for_collection_name("system.profile"), &[Find]);
                set.add_actions(ResourcePattern::AnySystemBuckets, CLUSTER_MONITOR_DB_ACTIONS);
            }
            BuiltinRole::HostManager => {
                set.add_actions(ResourcePattern::ClusterResource, HOST_MANAGER_CLUSTER_ACTIONS);
                set.add_actions(ResourcePattern::AnyNormalResource, HOST_MANAGER_DB_ACTIONS);
            }
            BuiltinRole::ClusterManager => {
                set.add_actions(
                    ResourcePattern::ClusterResource,
                    CLUSTER_MANAGER_CLUSTER_ACTIONS,
                );
                set.add_actions(
                    ResourcePattern::AnyNormalResource,
                    CLUSTER_MANAGER_DB_ACTIONS,
                );
                let config_actions = [READ_ACTIONS, &[Insert, Remove, Update][..]].concat();
                set.add_actions(ResourcePattern::for_db("config"), &config_actions);
                set.add_actions(exact("local", "system.replset"), READ_ACTIONS);
            }
            BuiltinRole::ClusterAdmin => {
                set.add_actions(ResourcePattern::AnyNormalResource, &[DropDatabase]);
            }
            BuiltinRole::Backup => {
                set.add_actions(ResourcePattern::ClusterResource, BACKUP_CLUSTER_ACTIONS);
                set.add_actions(
                    ResourcePattern::AnyResource,
                    &[CollStats, ListCollections, ListIndexes],
                );
                set.add_actions(ResourcePattern::AnyNormalResource, &[Find]);
                for internal_db in ["config", "local"] {
                    set.add_actions(ResourcePattern::for_db(internal_db), &[Find]);
                }
                for coll in ["system.js", "system.profile", "system.indexes", "system.namespaces"] {
                    set.add_actions(ResourcePattern::for_collection_name(coll), &[Find]);
                }
                for coll in ["system.users", "system.roles", "system.version"] {
                    set.add_actions(exact(ADMIN_DB, coll), &[Find]);
                }
                set.add_actions(ResourcePattern::AnySystemBuckets, &[Find]);
            }
            BuiltinRole::Restore => {
                set.add_actions(ResourcePattern::ClusterResource, &[GetParameter]);
                set.add_actions(ResourcePattern::AnyResource, &[ListCollections]);
                set.add_actions(ResourcePattern::AnyNormalResource, RESTORE_NORMAL_ACTIONS);
                set.add_actions(
                    ResourcePattern::for_collection_name("system.js"),
                    RESTORE_NORMAL_ACTIONS,
                );
                set.add_actions(
                    ResourcePattern::AnySystemBuckets,
                    &[BypassDocumentValidation, CreateCollection, CreateIndex, Insert],
                );
                set.add_actions(
                    exact(ADMIN_DB, "system.version"),
                    &[Find, Insert, Update, CreateCollection],
                );
            }
            BuiltinRole::Root => {
                let everything = ActionSet::all()
                    .subtract(&ActionSet::of(&[Internal, AnyAction]));
                set.add(super::Privilege::new(ResourcePattern::AnyResource, everything));
            }
            BuiltinRole::System => {
                set.add_actions(ResourcePattern::AnyResource, &[AnyAction]);
            }
        }

        set
    }

    /// Materialize this built-in as a role node in `db`.
    pub fn to_role(&self, db: &str) -> Role {
        let mut role = Role::new(RoleName::new(self.name(), db));
        role.privileges = self.privileges(db);
        for parent in self.parents(db) {
            role.add_parent(parent);
        }
        role.builtin = true;
        role
    }
}

impl fmt::Display for BuiltinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn exact(db: &str, coll: &str) -> ResourcePattern {
    ResourcePattern::for_namespace(&Namespace {
        db: db.to_string(),
        coll: coll.to_string(),
    })
}

fn buckets_in(db: &str) -> ResourcePattern {
    ResourcePattern::SystemBucketsInDb { db: db.to_string() }
}
