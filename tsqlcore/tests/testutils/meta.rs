//! In-memory metadata service
//!
//! Holds databases, users and streams behind one lock. Failures can be
//! scripted per operation to exercise retry paths.

use parking_lot::{Mutex, MutexGuard};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tsqlcore::ast::{Expr, MeasurementRef, Privilege, SelectStatement};
use tsqlcore::meta::*;

pub const DEFAULT_RP: &str = "autogen";
const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Default)]
struct State {
    nodes: Vec<DataNode>,
    pt_views: BTreeMap<String, Vec<PtOwner>>,
    databases: BTreeMap<String, DatabaseInfo>,
    users: BTreeMap<String, UserInfo>,
    streams: BTreeMap<String, StreamInfo>,
    failures: HashMap<&'static str, VecDeque<MetaError>>,
    calls: HashMap<&'static str, usize>,
}

#[derive(Default)]
pub struct MemoryMeta {
    state: Mutex<State>,
}

fn default_rp(name: &str) -> RetentionPolicyInfo {
    RetentionPolicyInfo {
        name: name.to_string(),
        replica_n: 1,
        shard_group_duration: WEEK,
        ..Default::default()
    }
}

fn source_matches(source: &MeasurementRef, rp: &str, name: &str) -> bool {
    if !source.retention_policy.is_empty() && source.retention_policy != rp {
        return false;
    }
    match &source.regex {
        Some(pattern) => Regex::new(pattern)
            .map(|re| re.is_match(name))
            .unwrap_or(false),
        None => source.name == name,
    }
}

fn database_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut DatabaseInfo, MetaError> {
    state
        .databases
        .get_mut(name)
        .filter(|db| !db.marked_deleted)
        .ok_or_else(|| MetaError::DatabaseNotFound(name.to_string()))
}

fn rp_mut<'a>(
    state: &'a mut State,
    database: &str,
    rp: &str,
) -> Result<&'a mut RetentionPolicyInfo, MetaError> {
    let db = database_mut(state, database)?;
    let name = if rp.is_empty() {
        db.default_retention_policy.clone()
    } else {
        rp.to_string()
    };
    db.retention_policies
        .get_mut(&name)
        .ok_or(MetaError::RetentionPolicyNotFound(name))
}

impl MemoryMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state for `op`, failing with the next scripted error if any
    fn begin(&self, op: &'static str) -> Result<MutexGuard<'_, State>, MetaError> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(err) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }

    /// Fail the next call of `op` with `err`
    pub fn fail_next(&self, op: &'static str, err: MetaError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn add_node(&self, id: u64, host: &str) {
        self.state.lock().nodes.push(DataNode {
            id,
            host: host.to_string(),
        });
    }

    /// Assign partitions of `database` to nodes
    pub fn set_pt_view(&self, database: &str, owners: &[(u32, u64)]) {
        let owners = owners
            .iter()
            .map(|&(pt_id, node_id)| PtOwner { pt_id, node_id })
            .collect();
        self.state
            .lock()
            .pt_views
            .insert(database.to_string(), owners);
    }

    pub fn add_database(&self, name: &str) {
        let mut state = self.state.lock();
        state.databases.insert(
            name.to_string(),
            DatabaseInfo {
                name: name.to_string(),
                default_retention_policy: DEFAULT_RP.to_string(),
                retention_policies: BTreeMap::from([(DEFAULT_RP.to_string(), default_rp(DEFAULT_RP))]),
                replica_n: 1,
                ..Default::default()
            },
        );
    }

    /// Add a measurement to the default retention policy of `database`
    pub fn add_measurement(
        &self,
        database: &str,
        name: &str,
        tags: &[&str],
        fields: &[(&str, ColumnType)],
    ) {
        let mut schema = BTreeMap::new();
        for tag in tags {
            schema.insert(tag.to_string(), ColumnType::Tag);
        }
        for (field, column_type) in fields {
            schema.insert(field.to_string(), *column_type);
        }
        let spec = MeasurementSpec {
            schema,
            ..Default::default()
        };
        let mut state = self.state.lock();
        if let Ok(rp) = rp_mut(&mut state, database, "") {
            rp.measurements
                .insert(name.to_string(), versioned_measurement(name, &spec));
        }
    }

    /// Apply `f` to a stored database
    pub fn update_database(&self, name: &str, f: impl FnOnce(&mut DatabaseInfo)) {
        if let Some(db) = self.state.lock().databases.get_mut(name) {
            f(db);
        }
    }

    pub fn add_stream(&self, info: StreamInfo) {
        self.state.lock().streams.insert(info.name.clone(), info);
    }

    fn matching(
        state: &State,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<Vec<MeasurementInfo>, MetaError> {
        let db = state
            .databases
            .get(database)
            .filter(|db| !db.marked_deleted)
            .ok_or_else(|| MetaError::DatabaseNotFound(database.to_string()))?;
        let mut matched = Vec::new();
        for (rp_name, rp) in &db.retention_policies {
            for (origin, mst) in &rp.measurements {
                if mst.marked_deleted {
                    continue;
                }
                if sources.is_empty() || sources.iter().any(|s| source_matches(s, rp_name, origin)) {
                    matched.push(mst.clone());
                }
            }
        }
        Ok(matched)
    }
}

fn versioned_measurement(name: &str, spec: &MeasurementSpec) -> MeasurementInfo {
    let shard_keys = if spec.shard_key.shard_key.is_empty() {
        Vec::new()
    } else {
        vec![spec.shard_key.clone()]
    };
    MeasurementInfo {
        name: format!("{}_0000", name),
        shard_keys,
        engine_type: spec.engine_type,
        index_relation: spec.index_relation.clone(),
        col_store: spec.col_store.clone(),
        schema: spec.schema.clone(),
        marked_deleted: false,
    }
}

impl MetaClient for MemoryMeta {
    fn data_nodes(&self) -> Result<Vec<DataNode>, MetaError> {
        Ok(self.begin("data_nodes")?.nodes.clone())
    }

    fn db_pt_view(&self, database: &str) -> Result<Vec<PtOwner>, MetaError> {
        let state = self.begin("db_pt_view")?;
        if !state.databases.contains_key(database) {
            return Err(MetaError::DatabaseNotFound(database.to_string()));
        }
        Ok(state.pt_views.get(database).cloned().unwrap_or_default())
    }

    fn databases(&self) -> Vec<DatabaseInfo> {
        self.state.lock().databases.values().cloned().collect()
    }

    fn database(&self, name: &str) -> Result<DatabaseInfo, MetaError> {
        let state = self.begin("database")?;
        state
            .databases
            .get(name)
            .filter(|db| !db.marked_deleted)
            .cloned()
            .ok_or_else(|| MetaError::DatabaseNotFound(name.to_string()))
    }

    fn create_database(
        &self,
        name: &str,
        enable_tag_array: bool,
        replicas: u32,
    ) -> Result<DatabaseInfo, MetaError> {
        let mut state = self.begin("create_database")?;
        let db = state
            .databases
            .entry(name.to_string())
            .or_insert_with(|| DatabaseInfo {
                name: name.to_string(),
                default_retention_policy: DEFAULT_RP.to_string(),
                retention_policies: BTreeMap::from([(
                    DEFAULT_RP.to_string(),
                    default_rp(DEFAULT_RP),
                )]),
                replica_n: replicas.max(1),
                enable_tag_array,
                ..Default::default()
            });
        Ok(db.clone())
    }

    fn create_database_with_retention_policy(
        &self,
        name: &str,
        spec: &RetentionPolicySpec,
        shard_key: &ShardKeyInfo,
        enable_tag_array: bool,
        replicas: u32,
    ) -> Result<DatabaseInfo, MetaError> {
        let mut state = self.begin("create_database")?;
        let rp_name = if spec.name.is_empty() {
            DEFAULT_RP.to_string()
        } else {
            spec.name.clone()
        };
        let rp = RetentionPolicyInfo {
            duration: spec.duration.unwrap_or_default(),
            replica_n: spec.replica_n.unwrap_or(1),
            hot_duration: spec.hot_duration.unwrap_or_default(),
            warm_duration: spec.warm_duration.unwrap_or_default(),
            index_group_duration: spec.index_group_duration,
            ..default_rp(&rp_name)
        };
        let db = DatabaseInfo {
            name: name.to_string(),
            default_retention_policy: rp_name.clone(),
            retention_policies: BTreeMap::from([(rp_name, rp)]),
            replica_n: replicas.max(1),
            enable_tag_array,
            shard_key: shard_key.clone(),
            ..Default::default()
        };
        state.databases.insert(name.to_string(), db.clone());
        Ok(db)
    }

    fn mark_database_delete(&self, name: &str) -> Result<(), MetaError> {
        let mut state = self.begin("mark_database_delete")?;
        state
            .databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MetaError::DatabaseNotFound(name.to_string()))
    }

    fn retention_policy(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Option<RetentionPolicyInfo>, MetaError> {
        let mut state = self.begin("retention_policy")?;
        let db = database_mut(&mut state, database)?;
        let name = if name.is_empty() {
            db.default_retention_policy.clone()
        } else {
            name.to_string()
        };
        Ok(db.retention_policies.get(&name).cloned())
    }

    fn create_retention_policy(
        &self,
        database: &str,
        spec: &RetentionPolicySpec,
        make_default: bool,
    ) -> Result<RetentionPolicyInfo, MetaError> {
        let mut state = self.begin("create_retention_policy")?;
        let db = database_mut(&mut state, database)?;
        let rp = RetentionPolicyInfo {
            duration: spec.duration.unwrap_or_default(),
            replica_n: spec.replica_n.unwrap_or(1),
            hot_duration: spec.hot_duration.unwrap_or_default(),
            warm_duration: spec.warm_duration.unwrap_or_default(),
            index_group_duration: spec.index_group_duration,
            shard_group_duration: if spec.shard_group_duration.is_zero() {
                WEEK
            } else {
                spec.shard_group_duration
            },
            ..default_rp(&spec.name)
        };
        db.retention_policies.insert(spec.name.clone(), rp.clone());
        if make_default {
            db.default_retention_policy = spec.name.clone();
        }
        Ok(rp)
    }

    fn update_retention_policy(
        &self,
        database: &str,
        name: &str,
        update: &RetentionPolicyUpdate,
        make_default: bool,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("update_retention_policy")?;
        let rp = rp_mut(&mut state, database, name)?;
        if let Some(d) = update.duration {
            rp.duration = d;
        }
        if let Some(n) = update.replica_n {
            rp.replica_n = n;
        }
        if let Some(d) = update.shard_group_duration {
            rp.shard_group_duration = d;
        }
        if let Some(d) = update.hot_duration {
            rp.hot_duration = d;
        }
        if let Some(d) = update.warm_duration {
            rp.warm_duration = d;
        }
        if let Some(d) = update.index_group_duration {
            rp.index_group_duration = d;
        }
        if make_default {
            database_mut(&mut state, database)?.default_retention_policy = name.to_string();
        }
        Ok(())
    }

    fn mark_retention_policy_delete(&self, database: &str, name: &str) -> Result<(), MetaError> {
        let mut state = self.begin("mark_retention_policy_delete")?;
        let db = database_mut(&mut state, database)?;
        db.retention_policies
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MetaError::RetentionPolicyNotFound(name.to_string()))
    }

    fn measurement(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
    ) -> Result<MeasurementInfo, MetaError> {
        let mut state = self.begin("measurement")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        rp.measurements
            .get(name)
            .cloned()
            .ok_or_else(|| MetaError::MeasurementNotFound(name.to_string()))
    }

    fn measurements(
        &self,
        database: &str,
        source: Option<&MeasurementRef>,
    ) -> Result<Vec<String>, MetaError> {
        let state = self.begin("measurements")?;
        let sources: Vec<MeasurementRef> = source.into_iter().cloned().collect();
        let names: BTreeSet<String> = Self::matching(&state, database, &sources)?
            .iter()
            .map(|m| m.origin_name().to_string())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn match_measurements(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<Vec<MeasurementInfo>, MetaError> {
        let state = self.begin("match_measurements")?;
        Self::matching(&state, database, sources)
    }

    fn create_measurement(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        spec: &MeasurementSpec,
    ) -> Result<MeasurementInfo, MetaError> {
        let mut state = self.begin("create_measurement")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        let mst = rp
            .measurements
            .entry(name.to_string())
            .or_insert_with(|| versioned_measurement(name, spec));
        Ok(mst.clone())
    }

    fn alter_shard_key(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        shard_key: &ShardKeyInfo,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("alter_shard_key")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        let mst = rp
            .measurements
            .get_mut(name)
            .ok_or_else(|| MetaError::MeasurementNotFound(name.to_string()))?;
        mst.shard_keys.push(shard_key.clone());
        Ok(())
    }

    fn mark_measurement_delete(&self, database: &str, name: &str) -> Result<(), MetaError> {
        let mut state = self.begin("mark_measurement_delete")?;
        let db = database_mut(&mut state, database)?;
        let mut found = false;
        for rp in db.retention_policies.values_mut() {
            found |= rp.measurements.remove(name).is_some();
        }
        if found {
            Ok(())
        } else {
            Err(MetaError::MeasurementNotFound(name.to_string()))
        }
    }

    fn field_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<BTreeMap<String, BTreeMap<String, ColumnType>>, MetaError> {
        let state = self.begin("field_keys")?;
        Ok(Self::matching(&state, database, sources)?
            .into_iter()
            .map(|m| {
                let fields = m
                    .schema
                    .into_iter()
                    .filter(|(_, t)| *t != ColumnType::Tag)
                    .collect();
                (m.name, fields)
            })
            .collect())
    }

    fn query_tag_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
        _condition: Option<&Expr>,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, MetaError> {
        let state = self.begin("query_tag_keys")?;
        Ok(Self::matching(&state, database, sources)?
            .into_iter()
            .map(|m| {
                let tags = m
                    .schema
                    .into_iter()
                    .filter(|(_, t)| *t == ColumnType::Tag)
                    .map(|(k, _)| k)
                    .collect();
                (m.name, tags)
            })
            .collect())
    }

    fn update_stream_mst_schema(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        _select: &SelectStatement,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("update_stream_mst_schema")?;
        rp_mut(&mut state, database, retention_policy)?;
        log::debug!("stream schema of {} updated", name);
        Ok(())
    }

    fn create_continuous_query(
        &self,
        database: &str,
        name: &str,
        query: &str,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("create_continuous_query")?;
        let db = database_mut(&mut state, database)?;
        if let Some(existing) = db.continuous_queries.iter().find(|cq| cq.name == name) {
            if existing.query == query {
                return Ok(());
            }
            return Err(MetaError::Conflict("continuous query already exists".to_string()));
        }
        db.continuous_queries.push(ContinuousQueryInfo {
            name: name.to_string(),
            query: query.to_string(),
        });
        Ok(())
    }

    fn drop_continuous_query(&self, name: &str, database: &str) -> Result<(), MetaError> {
        let mut state = self.begin("drop_continuous_query")?;
        let db = database_mut(&mut state, database)?;
        let before = db.continuous_queries.len();
        db.continuous_queries.retain(|cq| cq.name != name);
        if db.continuous_queries.len() == before {
            return Err(MetaError::ContinuousQueryNotFound(name.to_string()));
        }
        Ok(())
    }

    fn create_subscription(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        mode: &str,
        destinations: &[String],
    ) -> Result<(), MetaError> {
        let mut state = self.begin("create_subscription")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        rp.subscriptions.push(SubscriptionInfo {
            name: name.to_string(),
            mode: mode.to_string(),
            destinations: destinations.to_vec(),
        });
        Ok(())
    }

    fn drop_subscription(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("drop_subscription")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        rp.subscriptions.retain(|s| s.name != name);
        Ok(())
    }

    fn users(&self) -> Vec<UserInfo> {
        self.state.lock().users.values().cloned().collect()
    }

    fn create_user(
        &self,
        name: &str,
        _password: &str,
        admin: bool,
        rwuser: bool,
    ) -> Result<UserInfo, MetaError> {
        let mut state = self.begin("create_user")?;
        if state.users.contains_key(name) {
            return Err(MetaError::Conflict("user already exists".to_string()));
        }
        let user = UserInfo {
            name: name.to_string(),
            admin,
            rwuser,
            privileges: BTreeMap::new(),
        };
        state.users.insert(name.to_string(), user.clone());
        Ok(user)
    }

    fn update_user(&self, name: &str, _password: &str) -> Result<(), MetaError> {
        let state = self.begin("update_user")?;
        if !state.users.contains_key(name) {
            return Err(MetaError::UserNotFound(name.to_string()));
        }
        Ok(())
    }

    fn drop_user(&self, name: &str) -> Result<(), MetaError> {
        let mut state = self.begin("drop_user")?;
        state
            .users
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MetaError::UserNotFound(name.to_string()))
    }

    fn set_privilege(
        &self,
        user: &str,
        database: &str,
        privilege: Privilege,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("set_privilege")?;
        let user = state
            .users
            .get_mut(user)
            .ok_or_else(|| MetaError::UserNotFound(user.to_string()))?;
        user.privileges.insert(database.to_string(), privilege);
        Ok(())
    }

    fn set_admin_privilege(&self, user: &str, admin: bool) -> Result<(), MetaError> {
        let mut state = self.begin("set_admin_privilege")?;
        let user = state
            .users
            .get_mut(user)
            .ok_or_else(|| MetaError::UserNotFound(user.to_string()))?;
        user.admin = admin;
        Ok(())
    }

    fn user_privilege(&self, user: &str, database: &str) -> Result<Privilege, MetaError> {
        let state = self.begin("user_privilege")?;
        let user = state
            .users
            .get(user)
            .ok_or_else(|| MetaError::UserNotFound(user.to_string()))?;
        Ok(user
            .privileges
            .get(database)
            .copied()
            .unwrap_or(Privilege::NoPrivileges))
    }

    fn user_privileges(&self, user: &str) -> Result<BTreeMap<String, Privilege>, MetaError> {
        let state = self.begin("user_privileges")?;
        state
            .users
            .get(user)
            .map(|u| u.privileges.clone())
            .ok_or_else(|| MetaError::UserNotFound(user.to_string()))
    }

    fn new_downsample_policy(
        &self,
        database: &str,
        retention_policy: &str,
        info: &DownSamplePolicyInfo,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("new_downsample_policy")?;
        let rp = rp_mut(&mut state, database, retention_policy)?;
        rp.downsample = Some(info.clone());
        Ok(())
    }

    fn drop_downsample_policy(
        &self,
        database: &str,
        retention_policy: &str,
        drop_all: bool,
    ) -> Result<(), MetaError> {
        let mut state = self.begin("drop_downsample_policy")?;
        if drop_all {
            let db = database_mut(&mut state, database)?;
            for rp in db.retention_policies.values_mut() {
                rp.downsample = None;
            }
            return Ok(());
        }
        let rp = rp_mut(&mut state, database, retention_policy)?;
        if rp.downsample.take().is_none() {
            return Err(MetaError::DownSamplePolicyNotFound(retention_policy.to_string()));
        }
        Ok(())
    }

    fn streams(&self) -> Vec<StreamInfo> {
        self.state.lock().streams.values().cloned().collect()
    }

    fn create_stream_policy(&self, info: &StreamInfo) -> Result<(), MetaError> {
        let mut state = self.begin("create_stream_policy")?;
        if state.streams.contains_key(&info.name) {
            return Err(MetaError::Conflict("stream already exists".to_string()));
        }
        state.streams.insert(info.name.clone(), info.clone());
        Ok(())
    }

    fn drop_stream(&self, name: &str) -> Result<(), MetaError> {
        let mut state = self.begin("drop_stream")?;
        state
            .streams
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MetaError::StreamNotFound(name.to_string()))
    }
}
