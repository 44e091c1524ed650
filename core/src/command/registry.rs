//! Static command name to privilege template table.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::descriptor::{CommandTarget, MapReduceOutput};
use super::extractor::{Extraction, Scope};
use crate::error::{AuthzError, Result};
use crate::namespace::Namespace;
use crate::permissions::Action::{self, *};
use crate::permissions::ResourcePattern;

type CustomFn = fn(&mut Extraction<'_>) -> Result<()>;

/// How a command's required privileges are derived from its arguments.
#[derive(Clone, Copy)]
pub(crate) enum Template {
    /// Needs no privileges at all
    None,
    /// Actions on the target collection; `find` also reads through views
    Collection(&'static [Action]),
    /// Actions on every collection of the command's database
    Database(&'static [Action]),
    Cluster(&'static [Action]),
    AnyResource(&'static [Action]),
    /// Actions on the `"db.coll"` first argument
    NamespaceArg(&'static [Action]),
    /// Actions on the database named by the first argument
    DatabaseArg(&'static [Action]),
    /// A fixed collection in the `config` database
    ConfigCollection(&'static str, &'static [Action]),
    Custom(CustomFn),
}

impl Template {
    pub(crate) fn apply(&self, ex: &mut Extraction<'_>) -> Result<()> {
        let cmd = ex.cmd;
        match *self {
            Template::None => {}
            Template::Collection(actions) => {
                let ns = cmd.target_namespace()?;
                ex.require_namespace(&ns, actions);
                if actions.contains(&Find) {
                    ex.read(&ns, 0)?;
                }
            }
            Template::Database(actions) => ex.require(ResourcePattern::for_db(cmd.db.clone()), actions),
            Template::Cluster(actions) => ex.require(ResourcePattern::ClusterResource, actions),
            Template::AnyResource(actions) => ex.require(ResourcePattern::AnyResource, actions),
            Template::NamespaceArg(actions) => {
                let ns = cmd.namespace_argument()?;
                ex.require_namespace(&ns, actions);
            }
            Template::DatabaseArg(actions) => {
                let db = cmd.database_argument()?;
                ex.require(ResourcePattern::for_db(db), actions);
            }
            Template::ConfigCollection(coll, actions) => {
                ex.require_namespace(&Namespace::new("config", coll)?, actions);
            }
            Template::Custom(f) => f(ex)?,
        }
        Ok(())
    }
}

/// Template for `name`, `None` when the command is not known.
pub(crate) fn lookup(name: &str) -> Option<&'static Template> {
    COMMANDS.get(name)
}

/// Every registered command name, sorted.
pub fn command_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = COMMANDS.keys().copied().collect();
    names.sort_unstable();
    names
}

pub fn is_known_command(name: &str) -> bool {
    COMMANDS.contains_key(name)
}

lazy_static! {
    static ref COMMANDS: HashMap<&'static str, Template> = {
        use Template as T;
        let mut m: HashMap<&'static str, Template> = HashMap::new();

        for name in [
            "buildInfo",
            "connectionStatus",
            "endSessions",
            "features",
            "getLastError",
            "getPrevError",
            "getnonce",
            "hello",
            "isMaster",
            "listCommands",
            "logout",
            "ping",
            "resetError",
            "whatsmyuri",
        ] {
            m.insert(name, T::None);
        }

        // Reads
        for name in ["count", "distinct", "geoNear", "geoSearch", "group"] {
            m.insert(name, T::Collection(&[Find]));
        }
        m.insert("find", T::Custom(find));
        m.insert("getMore", T::Custom(get_more));
        m.insert("aggregate", T::Custom(aggregate));
        m.insert("mapReduce", T::Custom(map_reduce));
        m.insert("mapreduce", T::Custom(map_reduce));
        m.insert("killCursors", T::Collection(&[KillCursors]));
        m.insert("checkShardingIndex", T::NamespaceArg(&[Find]));
        m.insert("dataSize", T::NamespaceArg(&[Find]));
        m.insert("datasize", T::NamespaceArg(&[Find]));

        // Writes
        m.insert("insert", T::Custom(insert));
        m.insert("update", T::Custom(update));
        m.insert("delete", T::Collection(&[Remove]));
        m.insert("findAndModify", T::Custom(find_and_modify));
        m.insert("findandmodify", T::Custom(find_and_modify));

        // Collection DDL and maintenance
        m.insert("create", T::Custom(create));
        m.insert("collMod", T::Collection(&[CollMod]));
        m.insert("drop", T::Collection(&[DropCollection]));
        m.insert("createIndexes", T::Collection(&[CreateIndex]));
        m.insert("dropIndexes", T::Collection(&[DropIndex]));
        m.insert("deleteIndexes", T::Collection(&[DropIndex]));
        m.insert("listIndexes", T::Collection(&[ListIndexes]));
        m.insert("reIndex", T::Collection(&[ReIndex]));
        m.insert("compact", T::Collection(&[Compact]));
        m.insert("validate", T::Collection(&[Validate]));
        m.insert("collStats", T::Collection(&[CollStats]));
        m.insert("convertToCapped", T::Collection(&[ConvertToCapped]));
        m.insert("cloneCollectionAsCapped", T::Custom(clone_collection_as_capped));
        m.insert("cloneCollection", T::NamespaceArg(&[Insert, CreateIndex]));
        m.insert("renameCollection", T::Custom(rename_collection));
        m.insert("storageDetails", T::Collection(&[StorageDetails]));
        m.insert("touch", T::Cluster(&[Touch]));
        m.insert("planCacheClearFilters", T::Collection(&[PlanCacheIndexFilter]));
        m.insert("planCacheListFilters", T::Collection(&[PlanCacheRead]));
        m.insert("planCacheSetFilter", T::Collection(&[PlanCacheIndexFilter]));
        m.insert("planCacheListQueryShapes", T::Collection(&[PlanCacheRead]));
        m.insert("planCacheListPlans", T::Collection(&[PlanCacheRead]));
        m.insert("planCacheClear", T::Collection(&[PlanCacheWrite]));

        // Database level
        m.insert("listCollections", T::Database(&[ListCollections]));
        m.insert("dbHash", T::Database(&[DbHash]));
        m.insert("dbhash", T::Database(&[DbHash]));
        m.insert("dbStats", T::Database(&[DbStats]));
        m.insert("dropDatabase", T::Database(&[DropDatabase]));
        m.insert("repairDatabase", T::Database(&[RepairDatabase]));
        m.insert("filemd5", T::Database(&[Find]));
        m.insert("profile", T::Custom(profile));
        m.insert("copydb", T::Custom(copydb));

        // User and role administration
        m.insert("createUser", T::Database(&[CreateUser]));
        m.insert("dropUser", T::Database(&[DropUser]));
        m.insert("dropAllUsersFromDatabase", T::Database(&[DropUser]));
        m.insert("usersInfo", T::Database(&[ViewUser]));
        m.insert("createRole", T::Database(&[CreateRole]));
        m.insert("updateRole", T::Database(&[CreateRole, DropRole, GrantRole, RevokeRole]));
        m.insert("dropRole", T::Database(&[DropRole]));
        m.insert("dropAllRolesFromDatabase", T::Database(&[DropRole]));
        m.insert("rolesInfo", T::Database(&[ViewRole]));
        for name in ["grantRolesToUser", "grantRolesToRole", "grantPrivilegesToRole"] {
            m.insert(name, T::Database(&[GrantRole]));
        }
        for name in ["revokeRolesFromUser", "revokeRolesFromRole", "revokePrivilegesFromRole"] {
            m.insert(name, T::Database(&[RevokeRole]));
        }
        m.insert("invalidateUserCache", T::Cluster(&[InvalidateUserCache]));
        m.insert("authSchemaUpgrade", T::Cluster(&[AuthSchemaUpgrade]));

        // Diagnostics and server administration
        m.insert("connPoolStats", T::Cluster(&[ConnPoolStats]));
        m.insert("connPoolSync", T::Cluster(&[ConnPoolSync]));
        m.insert("diagLogging", T::Cluster(&[DiagLogging]));
        m.insert("fsync", T::Cluster(&[Fsync]));
        m.insert("getCmdLineOpts", T::Cluster(&[GetCmdLineOpts]));
        m.insert("getLog", T::Cluster(&[GetLog]));
        m.insert("getParameter", T::Cluster(&[GetParameter]));
        m.insert("hostInfo", T::Cluster(&[HostInfo]));
        m.insert("listDatabases", T::Cluster(&[ListDatabases]));
        m.insert("logRotate", T::Cluster(&[LogRotate]));
        m.insert("netstat", T::Cluster(&[Netstat]));
        m.insert("serverStatus", T::Cluster(&[ServerStatus]));
        m.insert("setParameter", T::Cluster(&[SetParameter]));
        m.insert("shutdown", T::Cluster(&[Shutdown]));
        m.insert("top", T::Cluster(&[Top]));
        m.insert("resync", T::Cluster(&[Resync]));
        m.insert("fsyncUnlock", T::Cluster(&[Unlock]));
        m.insert("killOp", T::Cluster(&[Killop]));
        m.insert("lockInfo", T::Cluster(&[ServerStatus]));
        m.insert("currentOp", T::Custom(current_op));
        m.insert("currentOpCtx", T::Cluster(&[Inprog]));
        m.insert("setFeatureCompatibilityVersion", T::Cluster(&[SetFeatureCompatibilityVersion]));
        m.insert("applyOps", T::AnyResource(&[AnyAction]));
        m.insert("eval", T::AnyResource(&[AnyAction]));
        m.insert("$eval", T::AnyResource(&[AnyAction]));

        // Replication
        m.insert("replSetGetStatus", T::Cluster(&[ReplSetGetStatus]));
        m.insert("replSetGetConfig", T::Cluster(&[ReplSetGetConfig]));
        for name in [
            "replSetFreeze",
            "replSetMaintenance",
            "replSetStepDown",
            "replSetStepUp",
            "replSetSyncFrom",
        ] {
            m.insert(name, T::Cluster(&[ReplSetStateChange]));
        }
        m.insert("replSetInitiate", T::Cluster(&[ReplSetConfigure]));
        m.insert("replSetReconfig", T::Cluster(&[ReplSetConfigure]));
        m.insert("appendOplogNote", T::Cluster(&[AppendOplogNote]));
        for name in [
            "replSetElect",
            "replSetFresh",
            "replSetGetRBID",
            "replSetHeartbeat",
            "replSetUpdatePosition",
            "handshake",
        ] {
            m.insert(name, T::Cluster(&[Internal]));
        }

        // Sharding
        m.insert("addShard", T::Cluster(&[AddShard]));
        m.insert("removeShard", T::Cluster(&[RemoveShard]));
        m.insert("listShards", T::Cluster(&[ListShards]));
        m.insert("getShardMap", T::Cluster(&[GetShardMap]));
        m.insert("shardingState", T::Cluster(&[ShardingState]));
        m.insert("flushRouterConfig", T::Cluster(&[FlushRouterConfig]));
        m.insert("cleanupOrphaned", T::Cluster(&[CleanupOrphaned]));
        m.insert("enableSharding", T::DatabaseArg(&[EnableSharding]));
        m.insert("movePrimary", T::DatabaseArg(&[MoveChunk]));
        m.insert("shardCollection", T::NamespaceArg(&[EnableSharding]));
        m.insert("getShardVersion", T::NamespaceArg(&[GetShardVersion]));
        m.insert("moveChunk", T::NamespaceArg(&[MoveChunk]));
        m.insert("split", T::NamespaceArg(&[SplitChunk]));
        m.insert("mergeChunks", T::NamespaceArg(&[SplitChunk]));
        m.insert("splitVector", T::NamespaceArg(&[SplitVector]));
        for name in ["setShardVersion", "splitChunk", "unsetSharding"] {
            m.insert(name, T::Cluster(&[Internal]));
        }
        m.insert("balancerStart", T::ConfigCollection("settings", &[Update]));
        m.insert("balancerStop", T::ConfigCollection("settings", &[Update]));
        m.insert("balancerStatus", T::ConfigCollection("settings", &[Find]));
        m.insert("addShardToZone", T::ConfigCollection("shards", &[Update]));
        m.insert("removeShardFromZone", T::Custom(remove_shard_from_zone));
        m.insert("updateZoneKeyRange", T::Custom(update_zone_key_range));

        // Server-to-server commands; the leading underscore adds `internal`
        for name in [
            "_configsvrAddShard",
            "_configsvrAddShardToZone",
            "_configsvrBalancerStart",
            "_configsvrBalancerStatus",
            "_configsvrBalancerStop",
            "_configsvrCommitChunkMerge",
            "_configsvrCommitChunkMigration",
            "_configsvrCommitChunkSplit",
            "_configsvrMoveChunk",
            "_configsvrMovePrimary",
            "_configsvrRemoveShardFromZone",
            "_configsvrShardCollection",
            "_configsvrUpdateZoneKeyRange",
            "_flushRoutingTableCacheUpdates",
            "_getUserCacheGeneration",
            "_isSelf",
            "_mergeAuthzCollections",
            "_migrateClone",
            "_recvChunkAbort",
            "_recvChunkCommit",
            "_recvChunkStart",
            "_recvChunkStatus",
            "_transferMods",
        ] {
            m.insert(name, T::None);
        }

        m
    };
}

fn find(ex: &mut Extraction<'_>) -> Result<()> {
    let ns = ex.cmd.target_namespace()?;
    ex.read(&ns, 0)?;
    if ex.cmd.args.has_term {
        ex.require(ResourcePattern::ClusterResource, &[Internal]);
    }
    Ok(())
}

fn get_more(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let coll = cmd
        .args
        .collection
        .as_deref()
        .ok_or_else(|| AuthzError::MalformedCommand("getMore requires 'collection'".into()))?;
    ex.read(&cmd.namespace_in_db(coll)?, 0)?;
    if cmd.args.has_term {
        ex.require(ResourcePattern::ClusterResource, &[Internal]);
    }
    Ok(())
}

fn aggregate(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let scope = match &cmd.target {
        CommandTarget::Collection(coll) => Scope::collection(cmd.namespace_in_db(coll)?),
        _ => Scope::database(cmd.db.clone()),
    };
    ex.aggregate(&scope)
}

fn insert(ex: &mut Extraction<'_>) -> Result<()> {
    let ns = ex.cmd.target_namespace()?;
    ex.write(&ns, &[Insert]);
    Ok(())
}

fn update(ex: &mut Extraction<'_>) -> Result<()> {
    let ns = ex.cmd.target_namespace()?;
    if ex.cmd.args.upsert {
        ex.write(&ns, &[Update, Insert]);
    } else {
        ex.write(&ns, &[Update]);
    }
    Ok(())
}

fn find_and_modify(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let ns = cmd.target_namespace()?;
    ex.read(&ns, 0)?;
    if cmd.args.remove {
        ex.require_namespace(&ns, &[Remove]);
    } else if cmd.args.upsert {
        ex.write(&ns, &[Update, Insert]);
    } else {
        ex.write(&ns, &[Update]);
    }
    Ok(())
}

/// Collections, capped collections and views.
fn create(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let ns = cmd.target_namespace()?;
    ex.require_namespace(&ns, &[CreateCollection]);

    if let Some(view_on) = cmd.args.view_on.as_deref() {
        let source = cmd.namespace_in_db(view_on)?;
        ex.read(&source, 1)?;
        let pipeline = cmd.pipeline.as_deref().unwrap_or(&[]);
        ex.pipeline(&Scope::collection(source), pipeline, 1)?;
    } else if cmd.args.capped {
        ex.require_namespace(&ns, &[ConvertToCapped]);
    }
    Ok(())
}

fn clone_collection_as_capped(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let source = cmd.target_namespace()?;
    let target = cmd.args.to_collection.as_deref().ok_or_else(|| {
        AuthzError::MalformedCommand("cloneCollectionAsCapped requires 'toCollection'".into())
    })?;
    let target = cmd.namespace_in_db(target)?;

    ex.require_namespace(&target, &[Insert, CreateIndex, ConvertToCapped]);
    ex.read(&source, 0)
}

/// Copies a database: read everything from `fromdb`, write into `todb`.
fn copydb(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let from_db = cmd
        .args
        .from_db
        .as_deref()
        .ok_or_else(|| AuthzError::MalformedCommand("copydb requires 'fromdb'".into()))?;
    let to_db = cmd
        .args
        .to_db
        .as_deref()
        .ok_or_else(|| AuthzError::MalformedCommand("copydb requires 'todb'".into()))?;

    ex.require(ResourcePattern::for_db(from_db), &[Find]);
    ex.require_namespace(&Namespace::new(from_db, "system.js")?, &[Find]);
    ex.require(ResourcePattern::for_db(to_db), &[Insert, CreateIndex]);
    ex.require_namespace(&Namespace::new(to_db, "system.js")?, &[Insert]);
    Ok(())
}

fn map_reduce(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let input = cmd.target_namespace()?;
    ex.read(&input, 0)?;

    let (db, coll, modifies_existing) = match &cmd.args.out {
        None | Some(MapReduceOutput::Inline) => return Ok(()),
        Some(MapReduceOutput::Replace { db, coll }) => (db, coll, false),
        Some(MapReduceOutput::Merge { db, coll }) | Some(MapReduceOutput::Reduce { db, coll }) => {
            (db, coll, true)
        }
    };
    let out = Namespace::new(db.as_deref().unwrap_or(&cmd.db), coll.clone())?;
    if modifies_existing {
        ex.write(&out, &[Insert, Update]);
    } else {
        ex.write(&out, &[Insert, Remove]);
    }
    Ok(())
}

/// Same-database renames only need `renameCollectionSameDB` plus read
/// access to the source; anything else is a copy followed by a drop.
fn rename_collection(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let source = cmd.namespace_argument()?;
    let to = cmd
        .args
        .to
        .as_deref()
        .ok_or_else(|| AuthzError::MalformedCommand("renameCollection requires 'to'".into()))?;
    let target = Namespace::parse(to)?;

    if source.db == target.db && !source.is_system() && !target.is_system() {
        ex.require(ResourcePattern::for_db(source.db.clone()), &[RenameCollectionSameDb]);
        ex.require_namespace(&source, &[Find]);
        if cmd.args.drop_target {
            ex.require_namespace(&target, &[DropCollection]);
        }
        return Ok(());
    }

    ex.require_namespace(&source, &[Find, DropCollection]);
    ex.write(&target, &[Insert, CreateIndex]);
    if cmd.args.drop_target {
        ex.require_namespace(&target, &[DropCollection]);
    }
    Ok(())
}

/// Level -1 only reads the profiler collection; anything else changes
/// the profiling level.
fn profile(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    match cmd.target {
        CommandTarget::Number(level) if level < 0.0 => {
            ex.require_namespace(&cmd.namespace_in_db("system.profile")?, &[Find]);
        }
        CommandTarget::Number(_) => {
            ex.require(ResourcePattern::for_db(cmd.db.clone()), &[EnableProfiler]);
        }
        ref other => {
            return Err(AuthzError::MalformedCommand(format!(
                "profile level must be a number, got {other}"
            )));
        }
    }
    Ok(())
}

fn remove_shard_from_zone(ex: &mut Extraction<'_>) -> Result<()> {
    ex.require_namespace(&Namespace::new("config", "shards")?, &[Update]);
    ex.require_namespace(&Namespace::new("config", "tags")?, &[Find]);
    Ok(())
}

fn update_zone_key_range(ex: &mut Extraction<'_>) -> Result<()> {
    ex.require_namespace(&Namespace::new("config", "shards")?, &[Find]);
    ex.require_namespace(&Namespace::new("config", "tags")?, &[Find, Insert, Remove, Update]);
    Ok(())
}

/// Inspecting other users' operations needs `inprog`; `$ownOps` alone does not.
fn current_op(ex: &mut Extraction<'_>) -> Result<()> {
    let cmd = ex.cmd;
    let args = &cmd.args;
    if args.all_ops || !args.own_ops {
        ex.require(ResourcePattern::ClusterResource, &[Inprog]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::extractor::PrivilegeExtractor;
    use crate::command::parser::parse_command;
    use crate::permissions::PrivilegeSet;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn required(db: &str, doc: serde_json::Value) -> PrivilegeSet {
        let cmd = parse_command(db, &doc).unwrap();
        PrivilegeExtractor::default().required_privileges(&cmd).unwrap()
    }

    fn exact(db: &str, coll: &str) -> ResourcePattern {
        ResourcePattern::for_namespace(&Namespace::new(db, coll).unwrap())
    }

    fn names(set: &PrivilegeSet, resource: &ResourcePattern) -> Vec<&'static str> {
        set.get(resource)
            .map(|p| p.actions.names())
            .unwrap_or_default()
    }

    #[test]
    fn test_registry_contents() {
        let names = command_names();
        assert!(names.len() > 130);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(is_known_command("renameCollection"));
        assert!(!is_known_command("frobnicate"));
    }

    #[test]
    fn test_no_privilege_commands() {
        for name in ["isMaster", "ping", "buildInfo", "whatsmyuri"] {
            assert!(required("admin", json!({name: 1})).is_empty(), "{name}");
        }
    }

    #[test]
    fn test_cluster_commands() {
        let set = required("admin", json!({"fsyncUnlock": 1}));
        assert_eq!(names(&set, &ResourcePattern::ClusterResource), vec!["unlock"]);

        let set = required("admin", json!({"replSetStepDown": 60}));
        assert_eq!(
            names(&set, &ResourcePattern::ClusterResource),
            vec!["replSetStateChange"]
        );

        let set = required("admin", json!({"serverStatus": 1}));
        assert_eq!(names(&set, &ResourcePattern::ClusterResource), vec!["serverStatus"]);
    }

    #[test]
    fn test_namespace_and_database_arguments() {
        let set = required("admin", json!({"shardCollection": "app.users", "key": {"_id": 1}}));
        assert_eq!(names(&set, &exact("app", "users")), vec!["enableSharding"]);

        let set = required("admin", json!({"enableSharding": "app"}));
        assert_eq!(names(&set, &ResourcePattern::for_db("app")), vec!["enableSharding"]);

        let cmd = parse_command("admin", &json!({"shardCollection": "nodot"})).unwrap();
        assert!(matches!(
            PrivilegeExtractor::default().required_privileges(&cmd),
            Err(AuthzError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn test_find_with_term_needs_internal() {
        let set = required("d", json!({"find": "foo", "term": 1}));
        assert_eq!(names(&set, &exact("d", "foo")), vec!["find"]);
        assert_eq!(names(&set, &ResourcePattern::ClusterResource), vec!["internal"]);

        let set = required("d", json!({"getMore": 12345, "collection": "foo"}));
        assert_eq!(set.len(), 1);
        assert_eq!(names(&set, &exact("d", "foo")), vec!["find"]);
    }

    #[test]
    fn test_create_variants() {
        let set = required("d", json!({"create": "x"}));
        assert_eq!(names(&set, &exact("d", "x")), vec!["createCollection"]);

        let set = required("d", json!({"create": "x", "capped": true, "size": 4096}));
        assert_eq!(
            names(&set, &exact("d", "x")),
            vec!["convertToCapped", "createCollection"]
        );

        let set = required(
            "d",
            json!({"create": "v", "viewOn": "src", "pipeline": [{"$lookup": {"from": "other", "as": "o"}}]}),
        );
        assert_eq!(names(&set, &exact("d", "v")), vec!["createCollection"]);
        assert_eq!(names(&set, &exact("d", "src")), vec!["find"]);
        assert_eq!(names(&set, &exact("d", "other")), vec!["find"]);
    }

    #[test]
    fn test_coll_mod_view_needs_view_name_only() {
        let set = required(
            "d",
            json!({"collMod": "v", "viewOn": "elsewhere", "pipeline": [{"$lookup": {"from": "secret", "as": "s"}}]}),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(names(&set, &exact("d", "v")), vec!["collMod"]);
    }

    #[test]
    fn test_clone_collection_as_capped() {
        let set = required("d", json!({"cloneCollectionAsCapped": "x", "toCollection": "y", "size": 1000}));
        assert_eq!(
            names(&set, &exact("d", "y")),
            vec!["convertToCapped", "createIndex", "insert"]
        );
        assert_eq!(names(&set, &exact("d", "x")), vec!["find"]);
    }

    #[test]
    fn test_copydb() {
        let set = required(
            "admin",
            json!({"copydb": 1, "fromdb": "roles_commands_1", "todb": "roles_commands_2"}),
        );
        assert_eq!(names(&set, &ResourcePattern::for_db("roles_commands_1")), vec!["find"]);
        assert_eq!(names(&set, &exact("roles_commands_1", "system.js")), vec!["find"]);
        assert_eq!(
            names(&set, &ResourcePattern::for_db("roles_commands_2")),
            vec!["createIndex", "insert"]
        );
        assert_eq!(names(&set, &exact("roles_commands_2", "system.js")), vec!["insert"]);
    }

    #[test]
    fn test_map_reduce_output_modes() {
        let set = required("d", json!({"mapReduce": "x", "map": "", "reduce": "", "out": {"inline": 1}}));
        assert_eq!(set.len(), 1);

        let set = required("d", json!({"mapReduce": "x", "map": "", "reduce": "", "out": "mr_out"}));
        assert_eq!(names(&set, &exact("d", "mr_out")), vec!["insert", "remove"]);

        let set = required(
            "d",
            json!({"mapReduce": "x", "out": {"reduce": "totals", "db": "r"}, "bypassDocumentValidation": true}),
        );
        assert_eq!(
            names(&set, &exact("r", "totals")),
            vec!["bypassDocumentValidation", "insert", "update"]
        );
    }

    #[test]
    fn test_rename_collection() {
        let set = required("admin", json!({"renameCollection": "d.x", "to": "d.y"}));
        assert_eq!(
            names(&set, &ResourcePattern::for_db("d")),
            vec!["renameCollectionSameDB"]
        );
        assert_eq!(names(&set, &exact("d", "x")), vec!["find"]);
        assert!(set.get(&exact("d", "y")).is_none());

        let set = required("admin", json!({"renameCollection": "d.x", "to": "d.y", "dropTarget": true}));
        assert_eq!(names(&set, &exact("d", "y")), vec!["dropCollection"]);

        let set = required("admin", json!({"renameCollection": "a.x", "to": "b.y"}));
        assert_eq!(names(&set, &exact("a", "x")), vec!["dropCollection", "find"]);
        assert_eq!(names(&set, &exact("b", "y")), vec!["createIndex", "insert"]);
    }

    #[test]
    fn test_profile_levels() {
        let set = required("d", json!({"profile": -1}));
        assert_eq!(names(&set, &exact("d", "system.profile")), vec!["find"]);

        let set = required("d", json!({"profile": 2}));
        assert_eq!(names(&set, &ResourcePattern::for_db("d")), vec!["enableProfiler"]);
    }

    #[test]
    fn test_writes_with_bypass_and_upsert() {
        let set = required("d", json!({"insert": "x", "documents": [{}], "bypassDocumentValidation": true}));
        assert_eq!(
            names(&set, &exact("d", "x")),
            vec!["bypassDocumentValidation", "insert"]
        );

        let set = required("d", json!({"update": "x", "updates": [{"q": {}, "u": {}, "upsert": true}]}));
        assert_eq!(names(&set, &exact("d", "x")), vec!["insert", "update"]);

        let set = required("d", json!({"findAndModify": "x", "remove": true}));
        assert_eq!(names(&set, &exact("d", "x")), vec!["find", "remove"]);
    }

    #[test]
    fn test_config_collection_commands() {
        let set = required("admin", json!({"removeShardFromZone": "shard0000", "zone": "z"}));
        assert_eq!(names(&set, &exact("config", "shards")), vec!["update"]);
        assert_eq!(names(&set, &exact("config", "tags")), vec!["find"]);
    }

    #[test]
    fn test_current_op_variants() {
        let set = required("admin", json!({"currentOp": 1, "$all": true}));
        assert_eq!(names(&set, &ResourcePattern::ClusterResource), vec!["inprog"]);

        let set = required("admin", json!({"currentOp": 1, "$ownOps": true}));
        assert!(set.is_empty());
    }
}
