//! Turns raw command documents into [`CommandDescriptor`]s.

use serde_json::{Map, Value};

use super::descriptor::{
    CommandArgs, CommandDescriptor, CommandTarget, MapReduceOutput, Pipeline, Stage, StageTarget,
    WhenMatched,
};
use crate::error::{AuthzError, Result};

/// Hard ceiling on pipeline nesting while parsing. The configured, usually
/// lower, limit is enforced during extraction.
pub const PARSE_DEPTH_LIMIT: usize = 512;

const TRANSFORM_STAGES: &[&str] = &[
    "$addFields",
    "$bucket",
    "$bucketAuto",
    "$count",
    "$densify",
    "$fill",
    "$geoNear",
    "$group",
    "$limit",
    "$match",
    "$project",
    "$redact",
    "$replaceRoot",
    "$replaceWith",
    "$sample",
    "$set",
    "$setWindowFields",
    "$skip",
    "$sort",
    "$sortByCount",
    "$unset",
    "$unwind",
];

/// Server-internal stages that do not carry the `$_` prefix.
const UNPREFIXED_INTERNAL_STAGES: &[&str] =
    &["$mergeCursors", "$setMetadata", "$setVariableFromSubPipeline"];

/// Parse a command document run against `db`. The first key names the
/// command.
pub fn parse_command(db: &str, doc: &Value) -> Result<CommandDescriptor> {
    let obj = doc
        .as_object()
        .ok_or_else(|| AuthzError::MalformedCommand("command must be a document".into()))?;
    let (name, first) = obj
        .iter()
        .next()
        .ok_or_else(|| AuthzError::MalformedCommand("empty command document".into()))?;
    if db.is_empty() {
        return Err(AuthzError::InvalidNamespace("empty database name".into()));
    }

    let mut cmd = CommandDescriptor::new(name.clone(), db, parse_target(first));
    cmd.args = parse_args(obj)?;
    if let Some(pipeline) = obj.get("pipeline") {
        cmd.pipeline = Some(parse_pipeline(pipeline, 0)?);
    }
    Ok(cmd)
}

/// Parse a command from JSON text.
pub fn parse_command_str(db: &str, json: &str) -> Result<CommandDescriptor> {
    let doc: Value = serde_json::from_str(json)?;
    parse_command(db, &doc)
}

fn parse_target(first: &Value) -> CommandTarget {
    match first {
        Value::String(s) => CommandTarget::Collection(s.clone()),
        Value::Number(n) => CommandTarget::Number(n.as_f64().unwrap_or_default()),
        Value::Bool(b) => CommandTarget::Flag(*b),
        // `group` carries its namespace inside the first argument
        Value::Object(inner) => match inner.get("ns").and_then(Value::as_str) {
            Some(ns) => CommandTarget::Collection(ns.to_string()),
            None => CommandTarget::Other,
        },
        _ => CommandTarget::Other,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Null => false,
        _ => true,
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(truthy)
}

fn string_arg(obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AuthzError::MalformedCommand(format!(
            "'{key}' must be a string"
        ))),
    }
}

fn parse_args(obj: &Map<String, Value>) -> Result<CommandArgs> {
    let upsert_in_updates = obj
        .get("updates")
        .and_then(Value::as_array)
        .is_some_and(|updates| {
            updates
                .iter()
                .any(|u| u.get("upsert").is_some_and(truthy))
        });

    Ok(CommandArgs {
        bypass_document_validation: flag(obj, "bypassDocumentValidation"),
        has_term: obj.contains_key("term"),
        view_on: string_arg(obj, "viewOn")?,
        capped: flag(obj, "capped"),
        to: string_arg(obj, "to")?,
        drop_target: flag(obj, "dropTarget"),
        to_collection: string_arg(obj, "toCollection")?,
        out: obj.get("out").map(parse_map_reduce_out).transpose()?,
        all_ops: flag(obj, "$all"),
        own_ops: flag(obj, "$ownOps"),
        from_db: string_arg(obj, "fromdb")?,
        to_db: string_arg(obj, "todb")?,
        collection: string_arg(obj, "collection")?,
        upsert: flag(obj, "upsert") || upsert_in_updates,
        remove: flag(obj, "remove"),
    })
}

fn parse_map_reduce_out(value: &Value) -> Result<MapReduceOutput> {
    match value {
        Value::String(coll) => Ok(MapReduceOutput::Replace {
            db: None,
            coll: coll.clone(),
        }),
        Value::Object(out) => {
            if out.contains_key("inline") {
                return Ok(MapReduceOutput::Inline);
            }
            let db = string_arg(out, "db")?;
            if let Some(coll) = string_arg(out, "replace")? {
                return Ok(MapReduceOutput::Replace { db, coll });
            }
            if let Some(coll) = string_arg(out, "merge")? {
                return Ok(MapReduceOutput::Merge { db, coll });
            }
            if let Some(coll) = string_arg(out, "reduce")? {
                return Ok(MapReduceOutput::Reduce { db, coll });
            }
            Err(AuthzError::MalformedCommand(
                "'out' must name inline, replace, merge or reduce".into(),
            ))
        }
        _ => Err(AuthzError::MalformedCommand(
            "'out' must be a string or a document".into(),
        )),
    }
}

/// Parse a pipeline array. `depth` counts enclosing sub-pipelines.
pub fn parse_pipeline(value: &Value, depth: usize) -> Result<Pipeline> {
    if depth > PARSE_DEPTH_LIMIT {
        return Err(AuthzError::RecursionLimitExceeded(PARSE_DEPTH_LIMIT));
    }
    let stages = value
        .as_array()
        .ok_or_else(|| AuthzError::MalformedCommand("pipeline must be an array".into()))?;

    stages
        .iter()
        .map(|stage| {
            let obj = stage.as_object().ok_or_else(|| {
                AuthzError::MalformedCommand("each pipeline stage must be a document".into())
            })?;
            let mut entries = obj.iter();
            match (entries.next(), entries.next()) {
                (Some((name, body)), None) => parse_stage(name, body, depth),
                _ => Err(AuthzError::MalformedCommand(
                    "each pipeline stage must have exactly one key".into(),
                )),
            }
        })
        .collect()
}

fn stage_body<'a>(name: &str, body: &'a Value) -> Result<&'a Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| AuthzError::MalformedCommand(format!("{name} must be a document")))
}

fn sub_pipeline(obj: &Map<String, Value>, depth: usize) -> Result<Pipeline> {
    match obj.get("pipeline") {
        Some(p) => parse_pipeline(p, depth + 1),
        None => Ok(Vec::new()),
    }
}

/// `"coll"` or `{db, coll}`.
fn parse_stage_target(name: &str, value: &Value) -> Result<StageTarget> {
    match value {
        Value::String(coll) => Ok(StageTarget::collection(coll.clone())),
        Value::Object(obj) => {
            let coll = string_arg(obj, "coll")?.ok_or_else(|| {
                AuthzError::MalformedCommand(format!("{name} target requires 'coll'"))
            })?;
            Ok(StageTarget {
                db: string_arg(obj, "db")?,
                coll,
            })
        }
        _ => Err(AuthzError::MalformedCommand(format!(
            "{name} target must be a string or a document"
        ))),
    }
}

fn parse_stage(name: &str, body: &Value, depth: usize) -> Result<Stage> {
    let stage = match name {
        "$collStats" => Stage::CollStats,
        "$indexStats" => Stage::IndexStats,
        "$planCacheStats" => Stage::PlanCacheStats,
        "$currentOp" => Stage::CurrentOp {
            all_users: body.get("allUsers").is_some_and(truthy),
        },
        "$listSessions" => Stage::ListSessions {
            all_users: body.get("allUsers").is_some_and(truthy),
        },
        "$listLocalSessions" => Stage::ListLocalSessions {
            all_users: body.get("allUsers").is_some_and(truthy),
        },
        "$changeStream" => Stage::ChangeStream {
            all_changes_for_cluster: body.get("allChangesForCluster").is_some_and(truthy),
        },
        "$documents" => Stage::Documents,
        "$queue" => Stage::Queue,
        "$listCatalog" => Stage::ListCatalog,
        "$lookup" => {
            let obj = stage_body(name, body)?;
            Stage::Lookup {
                from: obj
                    .get("from")
                    .map(|from| parse_stage_target(name, from))
                    .transpose()?,
                pipeline: sub_pipeline(obj, depth)?,
            }
        }
        "$graphLookup" => {
            let obj = stage_body(name, body)?;
            let from = obj.get("from").ok_or_else(|| {
                AuthzError::MalformedCommand("$graphLookup requires 'from'".into())
            })?;
            Stage::GraphLookup {
                from: parse_stage_target(name, from)?,
            }
        }
        "$unionWith" => match body {
            Value::String(coll) => Stage::UnionWith {
                coll: Some(StageTarget::collection(coll.clone())),
                pipeline: Vec::new(),
            },
            Value::Object(obj) => Stage::UnionWith {
                coll: string_arg(obj, "coll")?.map(StageTarget::collection),
                pipeline: sub_pipeline(obj, depth)?,
            },
            _ => {
                return Err(AuthzError::MalformedCommand(
                    "$unionWith must be a string or a document".into(),
                ));
            }
        },
        "$facet" => {
            let obj = stage_body(name, body)?;
            let branches = obj
                .iter()
                .map(|(branch, pipeline)| -> Result<(String, Pipeline)> {
                    Ok((branch.clone(), parse_pipeline(pipeline, depth + 1)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Stage::Facet(branches)
        }
        "$out" => Stage::Out(parse_stage_target(name, body)?),
        "$merge" => match body {
            Value::String(coll) => Stage::Merge {
                into: StageTarget::collection(coll.clone()),
                when_matched: WhenMatched::default(),
            },
            Value::Object(obj) => {
                let into = obj.get("into").ok_or_else(|| {
                    AuthzError::MalformedCommand("$merge requires 'into'".into())
                })?;
                Stage::Merge {
                    into: parse_stage_target(name, into)?,
                    when_matched: parse_when_matched(obj.get("whenMatched"))?,
                }
            }
            _ => {
                return Err(AuthzError::MalformedCommand(
                    "$merge must be a string or a document".into(),
                ));
            }
        },
        _ if name.starts_with("$_") || UNPREFIXED_INTERNAL_STAGES.contains(&name) => {
            Stage::Internal(name.to_string())
        }
        _ if TRANSFORM_STAGES.contains(&name) => Stage::Transform(name.to_string()),
        _ => Stage::Unknown(name.to_string()),
    };
    Ok(stage)
}

fn parse_when_matched(value: Option<&Value>) -> Result<WhenMatched> {
    match value {
        None => Ok(WhenMatched::default()),
        Some(Value::Array(_)) => Ok(WhenMatched::Pipeline),
        Some(Value::String(mode)) => match mode.as_str() {
            "replace" => Ok(WhenMatched::Replace),
            "keepExisting" => Ok(WhenMatched::KeepExisting),
            "merge" => Ok(WhenMatched::Merge),
            "fail" => Ok(WhenMatched::Fail),
            other => Err(AuthzError::MalformedCommand(format!(
                "unknown $merge whenMatched mode '{other}'"
            ))),
        },
        Some(_) => Err(AuthzError::MalformedCommand(
            "$merge whenMatched must be a string or a pipeline".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_first_key_is_command_name() {
        let cmd = parse_command("test", &json!({"find": "foo", "filter": {"a": 1}})).unwrap();
        assert_eq!(cmd.name, "find");
        assert_eq!(cmd.db, "test");
        assert_eq!(cmd.target, CommandTarget::Collection("foo".into()));

        let cmd = parse_command("admin", &json!({"ping": 1})).unwrap();
        assert_eq!(cmd.target, CommandTarget::Number(1.0));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse_command("test", &json!([1, 2])),
            Err(AuthzError::MalformedCommand(_))
        ));
        assert!(matches!(
            parse_command("test", &json!({})),
            Err(AuthzError::MalformedCommand(_))
        ));
        assert!(matches!(
            parse_command("test", &json!({"aggregate": "foo", "pipeline": {"$match": {}}})),
            Err(AuthzError::MalformedCommand(_))
        ));
        assert!(matches!(
            parse_command("test", &json!({"aggregate": "foo", "pipeline": [{"$match": {}, "$sort": {}}]})),
            Err(AuthzError::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_args() {
        let cmd = parse_command(
            "test",
            &json!({
                "renameCollection": "test.x",
                "to": "test.y",
                "dropTarget": true,
                "bypassDocumentValidation": 1
            }),
        )
        .unwrap();
        assert_eq!(cmd.args.to.as_deref(), Some("test.y"));
        assert!(cmd.args.drop_target);
        assert!(cmd.args.bypass_document_validation);

        let cmd = parse_command(
            "test",
            &json!({"update": "foo", "updates": [{"q": {}, "u": {}}, {"q": {}, "u": {}, "upsert": true}]}),
        )
        .unwrap();
        assert!(cmd.args.upsert);

        let cmd = parse_command("test", &json!({"find": "foo", "term": 3})).unwrap();
        assert!(cmd.args.has_term);

        assert!(parse_command("test", &json!({"renameCollection": "a.b", "to": 5})).is_err());
    }

    #[test]
    fn test_map_reduce_out() {
        let inline = parse_command("d", &json!({"mapReduce": "x", "out": {"inline": 1}})).unwrap();
        assert_eq!(inline.args.out, Some(MapReduceOutput::Inline));

        let named = parse_command("d", &json!({"mapReduce": "x", "out": "mr_out"})).unwrap();
        assert_eq!(
            named.args.out,
            Some(MapReduceOutput::Replace {
                db: None,
                coll: "mr_out".into()
            })
        );

        let merged = parse_command(
            "d",
            &json!({"mapReduce": "x", "out": {"merge": "totals", "db": "reports"}}),
        )
        .unwrap();
        assert_eq!(
            merged.args.out,
            Some(MapReduceOutput::Merge {
                db: Some("reports".into()),
                coll: "totals".into()
            })
        );
    }

    #[test]
    fn test_group_namespace_inside_first_argument() {
        let cmd = parse_command("d", &json!({"group": {"ns": "foo", "key": {"a": 1}}})).unwrap();
        assert_eq!(cmd.target, CommandTarget::Collection("foo".into()));
    }

    #[test]
    fn test_pipeline_stages() {
        let cmd = parse_command(
            "d",
            &json!({
                "aggregate": "foo",
                "pipeline": [
                    {"$match": {"a": 1}},
                    {"$lookup": {"from": "bar", "localField": "a", "foreignField": "b", "as": "c"}},
                    {"$unionWith": {"coll": "baz", "pipeline": [{"$project": {"a": 1}}]}},
                    {"$facet": {"left": [{"$count": "n"}], "right": [{"$graphLookup": {"from": "qux"}}]}},
                    {"$_internalInhibitOptimization": {}},
                    {"$mergeCursors": {}},
                    {"$teleport": {}},
                    {"$merge": {"into": {"db": "out", "coll": "m"}, "whenMatched": "keepExisting"}}
                ]
            }),
        )
        .unwrap();

        let pipeline = cmd.pipeline.unwrap();
        assert_eq!(pipeline[0], Stage::Transform("$match".into()));
        assert_eq!(
            pipeline[1],
            Stage::Lookup {
                from: Some(StageTarget::collection("bar")),
                pipeline: vec![]
            }
        );
        assert_eq!(
            pipeline[2],
            Stage::UnionWith {
                coll: Some(StageTarget::collection("baz")),
                pipeline: vec![Stage::Transform("$project".into())]
            }
        );
        match &pipeline[3] {
            Stage::Facet(branches) => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].0, "left");
                assert_eq!(
                    branches[1].1,
                    vec![Stage::GraphLookup {
                        from: StageTarget::collection("qux")
                    }]
                );
            }
            other => panic!("expected $facet, got {other:?}"),
        }
        assert_eq!(pipeline[4], Stage::Internal("$_internalInhibitOptimization".into()));
        assert_eq!(pipeline[5], Stage::Internal("$mergeCursors".into()));
        assert_eq!(pipeline[6], Stage::Unknown("$teleport".into()));
        assert_eq!(
            pipeline[7],
            Stage::Merge {
                into: StageTarget::in_db("out", "m"),
                when_matched: WhenMatched::KeepExisting
            }
        );
    }

    #[test]
    fn test_initial_source_flags() {
        let pipeline = parse_pipeline(
            &json!([
                {"$currentOp": {"allUsers": true}},
                {"$listSessions": {}},
                {"$changeStream": {"allChangesForCluster": true}}
            ]),
            0,
        )
        .unwrap();
        assert_eq!(pipeline[0], Stage::CurrentOp { all_users: true });
        assert_eq!(pipeline[1], Stage::ListSessions { all_users: false });
        assert_eq!(
            pipeline[2],
            Stage::ChangeStream {
                all_changes_for_cluster: true
            }
        );
        assert!(pipeline.iter().all(Stage::is_initial_source));
    }
}
