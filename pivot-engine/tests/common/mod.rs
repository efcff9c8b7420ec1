//! FILENAME: pivot-engine/tests/common/mod.rs
//! Test harness and fixtures for pivot integration tests.

#![allow(dead_code)]

use data_model::{
    AllowedActions, Attribute, Catalog, Collection, DataValue, Document, FormatContext, LinkInstance,
    LinkType, PermissionMap, RecordStore,
};
use pivot_engine::{build_pivot_tables, PivotConfig, PivotContext, PivotTable};
use query_engine::{AttributeAddress, Query, QueryStem, StemQuery};

/// Test harness owning everything a pivot build reads.
pub struct TestHarness {
    pub catalog: Catalog,
    pub store: RecordStore,
    pub permissions: PermissionMap,
    pub format: FormatContext,
}

impl TestHarness {
    /// Harness over the sports clubs fixture with full permissions.
    pub fn new() -> Self {
        TestHarness {
            catalog: ClubsFixture::catalog(),
            store: ClubsFixture::store(),
            permissions: ClubsFixture::permissions(),
            format: FormatContext::default(),
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionMap) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn context(&self) -> PivotContext<'_> {
        PivotContext {
            catalog: &self.catalog,
            store: &self.store,
            permissions: &self.permissions,
            format: &self.format,
        }
    }

    pub fn build(&self, query: &Query, config: &PivotConfig) -> Vec<PivotTable> {
        build_pivot_tables(query, config, &self.context())
    }

    /// Builds a single-stem query and returns its only table.
    pub fn build_one(&self, stem: StemQuery, config: &PivotConfig) -> PivotTable {
        let query = Query::default().with_stem(stem);
        let mut tables = self.build(&query, config);
        assert_eq!(tables.len(), 1, "expected exactly one table");
        tables.remove(0)
    }
}

/// Sports clubs, their members and events.
///
/// ```text
/// C1 Clubs    a1 Kind, a2 City
/// C2 Members  m1 Name, m2 Fee
/// C3 Events   e1 Kind, e2 Budget
/// L1 Membership (C1, C2) r Role
///
/// D1 Sport/Oslo   K1 -> M1 Anna 10 captain, K2 -> M2 Ben 20 player
/// D2 Sport/Bergen K4 -> M3 Cleo 5 player
/// D3 Dance/Oslo   K3 -> M2 Ben 20 player
/// D4 -/Oslo       K5 -> M4 Dan (no fee) player
/// E1 Sport 100, E2 Music 50
/// ```
pub struct ClubsFixture;

impl ClubsFixture {
    pub fn catalog() -> Catalog {
        let mut clubs = Collection::new("C1", "Clubs")
            .with_attribute(Attribute::new("a1", "Kind"))
            .with_attribute(Attribute::new("a2", "City"));
        clubs.color = Some("#c00".to_string());
        let mut members = Collection::new("C2", "Members")
            .with_attribute(Attribute::new("m1", "Name"))
            .with_attribute(Attribute::new("m2", "Fee"));
        members.color = Some("#0c0".to_string());
        let events = Collection::new("C3", "Events")
            .with_attribute(Attribute::new("e1", "Kind"))
            .with_attribute(Attribute::new("e2", "Budget"));
        let membership = LinkType::new("L1", "Membership", "C1", "C2")
            .with_attribute(Attribute::new("r", "Role"));

        Catalog::new(vec![clubs, members, events], vec![membership])
    }

    pub fn clubs() -> Vec<(&'static str, Option<&'static str>, &'static str)> {
        vec![
            ("D1", Some("Sport"), "Oslo"),
            ("D2", Some("Sport"), "Bergen"),
            ("D3", Some("Dance"), "Oslo"),
            ("D4", None, "Oslo"),
        ]
    }

    pub fn members() -> Vec<(&'static str, &'static str, Option<f64>)> {
        vec![
            ("M1", "Anna", Some(10.0)),
            ("M2", "Ben", Some(20.0)),
            ("M3", "Cleo", Some(5.0)),
            ("M4", "Dan", None),
        ]
    }

    pub fn memberships() -> Vec<(&'static str, &'static str, &'static str, &'static str)> {
        vec![
            ("K1", "D1", "M1", "captain"),
            ("K2", "D1", "M2", "player"),
            ("K3", "D3", "M2", "player"),
            ("K4", "D2", "M3", "player"),
            ("K5", "D4", "M4", "player"),
        ]
    }

    pub fn store() -> RecordStore {
        let mut store = RecordStore::default();
        for (id, kind, city) in Self::clubs() {
            let kind = kind.map_or(DataValue::Null, DataValue::text);
            store.add_document(
                Document::new(id, "C1").with_value("a1", kind).with_value("a2", city),
            );
        }
        for (id, name, fee) in Self::members() {
            let fee = fee.map_or(DataValue::Null, DataValue::Number);
            store.add_document(
                Document::new(id, "C2").with_value("m1", name).with_value("m2", fee),
            );
        }
        for (id, kind, budget) in [("E1", "Sport", 100.0), ("E2", "Music", 50.0)] {
            store.add_document(
                Document::new(id, "C3").with_value("e1", kind).with_value("e2", budget),
            );
        }
        for (id, club, member, role) in Self::memberships() {
            store.add_link_instance(
                LinkInstance::new(id, "L1", club, member).with_value("r", role),
            );
        }
        store
    }

    pub fn permissions() -> PermissionMap {
        PermissionMap::new()
            .with_collection("C1", AllowedActions::all())
            .with_collection("C2", AllowedActions::all())
            .with_collection("C3", AllowedActions::all())
            .with_link_type("L1", AllowedActions::all())
    }

    // ------------------------------------------------------------------
    // Stems and attribute addresses
    // ------------------------------------------------------------------

    pub fn clubs_stem() -> QueryStem {
        QueryStem::new("C1")
    }

    /// Clubs -> Membership -> Members.
    pub fn membership_stem() -> QueryStem {
        QueryStem::new("C1").with_link_type("L1")
    }

    pub fn events_stem() -> QueryStem {
        QueryStem::new("C3")
    }

    pub fn kind() -> AttributeAddress {
        AttributeAddress::collection(0, "C1", "a1")
    }

    pub fn city() -> AttributeAddress {
        AttributeAddress::collection(0, "C1", "a2")
    }

    pub fn role() -> AttributeAddress {
        AttributeAddress::link_type(1, "L1", "r")
    }

    pub fn fee() -> AttributeAddress {
        AttributeAddress::collection(2, "C2", "m2")
    }

    pub fn event_kind() -> AttributeAddress {
        AttributeAddress::collection(0, "C3", "e1")
    }

    pub fn budget() -> AttributeAddress {
        AttributeAddress::collection(0, "C3", "e2")
    }
}

/// Numbers of a table, `None` for empty or non-numeric cells.
pub fn numbers(table: &PivotTable) -> Vec<Vec<Option<f64>>> {
    table
        .values
        .iter()
        .map(|row| row.iter().map(|v| v.as_ref().and_then(|v| v.as_number())).collect())
        .collect()
}

/// Titles of the top-level headers.
pub fn titles(headers: &[pivot_engine::PivotHeader]) -> Vec<&str> {
    headers.iter().map(|h| h.title.as_str()).collect()
}
