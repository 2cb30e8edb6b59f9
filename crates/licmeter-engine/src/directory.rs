//! Entity directory
//!
//! Resolves entity ids to their display name, tags, and management zones.
//! Most entity types carry zones themselves. A few only point at a parent via
//! a relationship and inherit the parent's zones; the parent's type is
//! resolved on demand. Resolution runs on an explicit work stack with an
//! in-progress set, so a relationship cycle ends with the affected entities
//! getting no zones.

use crate::client::{fetch_all_entities, EntityQuery, RawEntity, Relationships, TenantApi};
use licmeter_common::{collect_tags, entity_type_of, EntityAttribution, HostRecord, Result};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Entities per inventory page
const INVENTORY_PAGE_SIZE: u32 = 4000;

/// Relationship side a parent id is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    To,
    From,
}

/// Types whose zones come from a related parent entity
#[derive(Debug)]
struct ParentLink {
    entity_type: &'static str,
    side: Side,
    relation: &'static str,
}

const PARENT_LINKS: &[ParentLink] = &[
    ParentLink {
        entity_type: "DYNAMO_DB_TABLE",
        side: Side::To,
        relation: "isSiteOf",
    },
    ParentLink {
        entity_type: "EBS_VOLUME",
        side: Side::From,
        relation: "isDiskOf",
    },
];

impl ParentLink {
    fn fields(&self) -> &'static str {
        match self.side {
            Side::To => "toRelationships,tags",
            Side::From => "fromRelationships,tags",
        }
    }

    fn parent_of(&self, entity: &RawEntity) -> Option<String> {
        let relationships: &Relationships = match self.side {
            Side::To => &entity.to_relationships,
            Side::From => &entity.from_relationships,
        };
        relationships
            .get(self.relation)?
            .first()?
            .id
            .clone()
            .filter(|id| !id.is_empty())
    }
}

fn parent_link(entity_type: &str) -> Option<&'static ParentLink> {
    PARENT_LINKS.iter().find(|l| l.entity_type == entity_type)
}

/// Pending resolution of one entity type
struct Frame {
    entity_type: String,
    entities: Option<Vec<RawEntity>>,
}

impl Frame {
    fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entities: None,
        }
    }
}

/// Attribution lookup built fresh for each tick
pub struct EntityDirectory {
    entries: HashMap<String, EntityAttribution>,
    attempted: HashSet<String>,
    inventory_from: i64,
    started: Instant,
    budget: Duration,
}

impl EntityDirectory {
    /// Empty directory whose fetch budget starts now
    pub fn new(inventory_from_millis: i64, budget: Duration) -> Self {
        Self::started_at(Instant::now(), inventory_from_millis, budget)
    }

    /// Empty directory whose fetch budget started at `started`
    pub fn started_at(started: Instant, inventory_from_millis: i64, budget: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            attempted: HashSet::new(),
            inventory_from: inventory_from_millis,
            started,
            budget,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityAttribution> {
        self.entries.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `entity_type` was already fetched or skipped this tick
    pub fn is_attempted(&self, entity_type: &str) -> bool {
        self.attempted.contains(entity_type)
    }

    /// Whether new entity types may still be fetched
    pub fn has_budget(&self) -> bool {
        self.started.elapsed() < self.budget
    }

    /// Reuse a cached host's attribution without fetching
    pub fn adopt_host(&mut self, host_id: &str, record: &HostRecord) {
        self.entries
            .insert(host_id.to_string(), record.attribution());
    }

    fn query_for(&self, entity_type: &str) -> EntityQuery {
        let fields = match parent_link(entity_type) {
            Some(link) => link.fields(),
            None => "managementZones,tags",
        };
        EntityQuery {
            entity_type: entity_type.to_string(),
            from: self.inventory_from.to_string(),
            to: None,
            fields: fields.to_string(),
            page_size: INVENTORY_PAGE_SIZE,
        }
    }

    /// Fetch every entity of `entity_type` and, for derived types, their
    /// parents' types.
    ///
    /// Types already attempted this tick are not fetched again. Once the
    /// budget is spent, unfetched types are skipped.
    #[instrument(skip(self, api))]
    pub async fn resolve(&mut self, api: &dyn TenantApi, entity_type: &str) -> Result<()> {
        if self.attempted.contains(entity_type) {
            return Ok(());
        }

        let mut stack = vec![Frame::new(entity_type)];
        let mut in_progress: HashSet<String> = HashSet::new();

        while let Some(mut frame) = stack.pop() {
            if frame.entities.is_none() {
                if self.attempted.contains(&frame.entity_type) {
                    continue;
                }
                if !self.has_budget() {
                    info!(entity_type = %frame.entity_type, "No time to fetch, skipping entity type");
                    self.attempted.insert(frame.entity_type);
                    continue;
                }
                let query = self.query_for(&frame.entity_type);
                let entities = fetch_all_entities(api, &query).await?;
                debug!(entity_type = %frame.entity_type, count = entities.len(), "Fetched entities");
                in_progress.insert(frame.entity_type.clone());
                frame.entities = Some(entities);
            }

            let link = parent_link(&frame.entity_type);

            let pending = match (link, frame.entities.as_deref()) {
                (Some(link), Some(entities)) => self.unresolved_parents(link, entities, &in_progress),
                _ => Vec::new(),
            };
            if !pending.is_empty() {
                stack.push(frame);
                stack.extend(pending.into_iter().map(Frame::new));
                continue;
            }

            let entities = frame.entities.take().unwrap_or_default();
            in_progress.remove(&frame.entity_type);
            self.finish(&frame.entity_type, link, entities, &in_progress);
            self.attempted.insert(frame.entity_type);
        }

        Ok(())
    }

    /// Parent types that still need a fetch before `entities` can finish
    fn unresolved_parents(
        &self,
        link: &ParentLink,
        entities: &[RawEntity],
        in_progress: &HashSet<String>,
    ) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for parent in entities.iter().filter_map(|e| link.parent_of(e)) {
            let parent_type = entity_type_of(&parent);
            if !self.attempted.contains(parent_type)
                && !in_progress.contains(parent_type)
                && !pending.iter().any(|p| p == parent_type)
            {
                pending.push(parent_type.to_string());
            }
        }
        pending
    }

    fn finish(
        &mut self,
        entity_type: &str,
        link: Option<&ParentLink>,
        entities: Vec<RawEntity>,
        in_progress: &HashSet<String>,
    ) {
        let mut cycles = 0usize;

        for entity in entities {
            let zones = match link {
                None => entity.management_zones.clone(),
                Some(link) => match link.parent_of(&entity) {
                    Some(parent) => {
                        let parent_type = entity_type_of(&parent);
                        if parent_type == entity_type || in_progress.contains(parent_type) {
                            cycles += 1;
                            Vec::new()
                        } else {
                            self.entries
                                .get(&parent)
                                .map(|p| p.zones.clone())
                                .unwrap_or_default()
                        }
                    }
                    None => Vec::new(),
                },
            };

            let attribution = EntityAttribution {
                name: entity.display_name.clone(),
                tags: collect_tags(entity.tags.iter()),
                zones,
            };
            self.entries.insert(entity.entity_id, attribution);
        }

        if cycles > 0 {
            warn!(entity_type, cycles, "Parent relationship cycle, entities left without zones");
        }
    }
}
