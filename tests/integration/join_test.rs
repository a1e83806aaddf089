// Join Integration Tests
//
// Direct and pivot joins, hydration of nested collections, and paging over
// joined roots.

use anyhow::Result;
use bayun_crud::{ColumnType, DataValue, Entity, FieldDef, Policy, QueryError, QueryResult, Relation, RowReader, col, field};
use uuid::Uuid;

#[path = "../common/mod.rs"]
mod common;
use common::{SUB_TABLES, TestTable1, TestTable2, get_test_db};

#[test]
fn test_join_with_filters_on_both_tables() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    let sub_id = db.run_in_transaction(|| -> Result<Uuid> {
        t1.insert(&[TestTable1::new(2000, "New One", 40)])?;
        let me = TestTable2::new(2000, "Me");
        let not_me = TestTable2::new(2000, "Not Me");
        db.table::<TestTable2>()?.insert(&[me.clone(), not_me])?;
        Ok(me.id)
    })?;

    let j21 = t1.clone().join(SUB_TABLES, "id", "parentId")?;
    let j2 = j21.clone().filter(field::<TestTable1>("id").eq(2000).and(field::<TestTable2>("name").eq("Me")));
    let j3 = j21.clone().filter(
        field::<TestTable1>("id").gt(20)
            .and(field::<TestTable1>("name").eq("Me").or(field::<TestTable1>("name").eq("You")).not()),
    );
    assert_eq!(j3.count()?, 1);

    let found = j2.select()?;
    assert_eq!(j2.count()?, 1);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 2000);
    let subs = found[0].sub_tables.as_ref().expect("joined relation is populated");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, sub_id);

    db.create::<TestTable1>(Policy::DEFAULT)?;
    assert_eq!(j2.select()?[0].id, 2000);

    db.create::<TestTable1>(Policy::DROP_TABLE)?;
    assert!(j2.select()?.is_empty());
    Ok(())
}

#[test]
fn test_select_join_ordered() -> Result<()> {
    let db = get_test_db()?;
    let j2 = db.table::<TestTable1>()?
        .order_by("name")
        .join(SUB_TABLES, "id", "parentId")?
        .order_by("id")
        .filter(field::<TestTable2>("name").eq("me"));

    let count = j2.count()?;
    let rows = j2.select()?;
    assert_ne!(count, 0);
    assert_eq!(count, rows.len() as u64);
    for row in &rows {
        let subs = row.sub_tables.as_ref().unwrap();
        assert_eq!(subs.len(), 3);
        assert!(subs.iter().all(|s| s.name.as_deref() == Some("me") && s.parent_id == row.id));
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn test_unfiltered_join_hydrates_every_child_once() -> Result<()> {
    let db = get_test_db()?;
    let rows = db.table::<TestTable1>()?.join(SUB_TABLES, "id", "parentId")?.select()?;
    assert_eq!(rows.len(), 5);
    for row in &rows {
        let subs = row.sub_tables.as_ref().unwrap();
        assert_eq!(subs.len(), 5);
        let mut ids: Vec<Uuid> = subs.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
    Ok(())
}

#[test]
fn test_join_paging_counts_roots() -> Result<()> {
    let db = get_test_db()?;
    let joined = db.table::<TestTable1>()?
        .order_by("id")
        .join(SUB_TABLES, "id", "parentId")?
        .limit(2, 1);
    assert_eq!(joined.count()?, 2);
    let rows = joined.select()?;
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
    assert!(rows.iter().all(|r| r.sub_tables.as_ref().map(Vec::len) == Some(5)));
    assert_eq!(joined.first()?.map(|r| r.id), Some(2));
    Ok(())
}

#[test]
fn test_roots_without_children_are_absent() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    t1.insert(&[TestTable1::new(77, "lonely", 0)])?;
    let joined = t1.clone().join(SUB_TABLES, "id", "parentId")?;
    assert_eq!(joined.count()?, 5);
    assert!(joined.select()?.iter().all(|r| r.id != 77));
    Ok(())
}

#[test]
fn test_bad_join_columns() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    assert!(matches!(t1.clone().join(SUB_TABLES, "id", "missing"), Err(QueryError::MalformedExpression(_))));
    assert!(matches!(t1.clone().join(SUB_TABLES, "missing", "parentId"), Err(QueryError::MalformedExpression(_))));
    let ordered = t1.join(SUB_TABLES, "id", "parentId")?.order_by("missing");
    assert!(matches!(ordered.select(), Err(QueryError::MalformedExpression(_))));
    Ok(())
}

#[derive(Debug)]
struct Parent {
    id: i64,
    children: Option<Vec<Child>>,
}

#[derive(Debug)]
struct Child {
    id: i64,
}

#[derive(Debug)]
struct Pivot {
    parent_id: i64,
    child_id: i64,
}

impl Entity for Parent {
    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::column::<i64>("id"), FieldDef::to_many::<Child>("children")]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Parent { id: row.next()?, children: None })
    }
}

impl Entity for Child {
    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::column::<i64>("id")]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Child { id: row.next()? })
    }
}

impl Entity for Pivot {
    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::column::<i64>("parentId"), FieldDef::column::<i64>("childId")]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.parent_id.to_value(), self.child_id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Pivot { parent_id: row.next()?, child_id: row.next()? })
    }
}

const CHILDREN: Relation<Parent, Child> = Relation::new("children", |p| &mut p.children);

fn pivot_rows(pairs: &[(i64, i64)]) -> Vec<Pivot> {
    pairs.iter().map(|&(parent_id, child_id)| Pivot { parent_id, child_id }).collect()
}

#[test]
fn test_pivot_join() -> Result<()> {
    let db = get_test_db()?;
    db.create::<Parent>(Policy::DEFAULT)?.delete()?;
    db.create::<Child>(Policy::DEFAULT)?.delete()?;
    db.create::<Pivot>(Policy::DEFAULT)?.delete()?;

    db.table::<Parent>()?.insert(&[Parent { id: 1, children: None }])?;
    db.table::<Child>()?.insert(&[Child { id: 1 }, Child { id: 2 }, Child { id: 3 }])?;
    db.table::<Pivot>()?.insert(&pivot_rows(&[(1, 1), (1, 2), (1, 3)]))?;

    let join = db.table::<Parent>()?.join_pivot::<Pivot, _>(CHILDREN, "id", "parentId", "id", "childId")?;
    let parents = join.select()?;
    let parent = parents.first().expect("one parent");
    assert_eq!(parent.children.as_ref().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn test_pivot_join_many_to_many_without_duplicates() -> Result<()> {
    let db = get_test_db()?;
    db.create::<Parent>(Policy::DROP_TABLE)?;
    db.create::<Pivot>(Policy::DROP_TABLE)?;

    db.table::<Parent>()?.insert(&[1, 2, 3].map(|id| Parent { id, children: None }))?;
    db.table::<Child>()?.insert(&[10, 20, 30].map(|id| Child { id }))?;
    // (1, 10) appears twice and must collapse to one child
    db.table::<Pivot>()?.insert(&pivot_rows(&[
        (1, 10), (1, 20), (1, 30), (1, 10),
        (2, 10), (2, 20), (2, 30),
    ]))?;

    let join = db.table::<Parent>()?
        .order_by("id")
        .join_pivot::<Pivot, _>(CHILDREN, "id", "parentId", "id", "childId")?
        .order_by("id");
    assert_eq!(join.count()?, 2);
    let parents = join.select()?;
    assert_eq!(parents.len(), 2);
    for parent in &parents {
        let ids: Vec<i64> = parent.children.as_ref().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    let filtered = join.clone().filter(field::<Child>("id").eq(20).and(field::<Pivot>("parentId").eq(2)));
    let parents = filtered.select()?;
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].id, 2);
    Ok(())
}

#[derive(Debug)]
struct PhoneNumber {
    id: Uuid,
    person_id: Uuid,
    planet_code: i64,
    number: String,
}

#[derive(Debug)]
struct Person {
    id: Uuid,
    first_name: String,
    last_name: String,
    phone_numbers: Option<Vec<PhoneNumber>>,
}

impl Entity for PhoneNumber {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::column::<Uuid>("id"),
            FieldDef::column::<Uuid>("personId"),
            FieldDef::column::<i64>("planetCode"),
            FieldDef::column::<String>("number"),
        ]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value(), self.person_id.to_value(), self.planet_code.to_value(), self.number.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(PhoneNumber {
            id: row.next()?,
            person_id: row.next()?,
            planet_code: row.next()?,
            number: row.next()?,
        })
    }
}

impl Entity for Person {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::column::<Uuid>("id"),
            FieldDef::column::<String>("firstName"),
            FieldDef::column::<String>("lastName"),
            FieldDef::to_many::<PhoneNumber>("phoneNumbers"),
        ]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value(), self.first_name.to_value(), self.last_name.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Person {
            id: row.next()?,
            first_name: row.next()?,
            last_name: row.next()?,
            phone_numbers: None,
        })
    }
}

const PHONE_NUMBERS: Relation<Person, PhoneNumber> = Relation::new("phoneNumbers", |p| &mut p.phone_numbers);

#[test]
fn test_person_phone_numbers() -> Result<()> {
    let db = get_test_db()?;
    // Creation recurses into relation tables, so PhoneNumber exists too
    db.create::<Person>(Policy::RECONCILE_TABLE)?;
    assert!(db.table_exists("PhoneNumber")?);

    let owen = Uuid::new_v4();
    let beru = Uuid::new_v4();
    db.run_in_transaction(|| -> Result<()> {
        db.table::<Person>()?.insert(&[
            Person { id: owen, first_name: "Owen".into(), last_name: "Lars".into(), phone_numbers: None },
            Person { id: beru, first_name: "Beru".into(), last_name: "Lars".into(), phone_numbers: None },
        ])?;
        db.table::<PhoneNumber>()?.insert(&[
            PhoneNumber { id: Uuid::new_v4(), person_id: owen, planet_code: 12, number: "555-555-1212".into() },
            PhoneNumber { id: Uuid::new_v4(), person_id: owen, planet_code: 15, number: "555-555-2222".into() },
            PhoneNumber { id: Uuid::new_v4(), person_id: beru, planet_code: 12, number: "555-555-1212".into() },
        ])?;
        Ok(())
    })?;

    let people = db.table::<Person>()?
        .order_by("lastName")
        .order_by("firstName")
        .join(PHONE_NUMBERS, "id", "personId")?
        .order_by_desc("planetCode")
        .filter(field::<Person>("lastName").eq("Lars").and(field::<PhoneNumber>("planetCode").eq(12)))
        .select()?;

    let names: Vec<&str> = people.iter().map(|p| p.first_name.as_str()).collect();
    assert_eq!(names, vec!["Beru", "Owen"]);
    for person in &people {
        let numbers = person.phone_numbers.as_ref().unwrap();
        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].planet_code, 12);
        assert_eq!(numbers[0].person_id, person.id);
    }

    let all_numbers = db.table::<Person>()?
        .join(PHONE_NUMBERS, "id", "personId")?
        .order_by_desc("planetCode")
        .filter(col("id").eq(owen))
        .first()?
        .and_then(|p| p.phone_numbers)
        .unwrap_or_default();
    let codes: Vec<i64> = all_numbers.iter().map(|n| n.planet_code).collect();
    assert_eq!(codes, vec![15, 12]);
    Ok(())
}

#[derive(Debug)]
struct Owner {
    id: i64,
    pets: Option<Vec<Pet>>,
    cars: Option<Vec<Car>>,
}

#[derive(Debug)]
struct Pet {
    id: i64,
    owner_id: i64,
}

#[derive(Debug)]
struct Car {
    id: i64,
    owner_id: i64,
}

impl Entity for Owner {
    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::column::<i64>("id"),
            FieldDef::to_many::<Pet>("pets"),
            FieldDef::to_many::<Car>("cars"),
        ]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Owner { id: row.next()?, pets: None, cars: None })
    }
}

impl Entity for Pet {
    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::column::<i64>("id"), FieldDef::column::<i64>("ownerId")]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value(), self.owner_id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Pet { id: row.next()?, owner_id: row.next()? })
    }
}

impl Entity for Car {
    fn fields() -> Vec<FieldDef> {
        vec![FieldDef::column::<i64>("id"), FieldDef::column::<i64>("ownerId")]
    }

    fn to_row(&self) -> Vec<DataValue> {
        vec![self.id.to_value(), self.owner_id.to_value()]
    }

    fn from_row(row: &mut RowReader<'_>) -> QueryResult<Self> {
        Ok(Car { id: row.next()?, owner_id: row.next()? })
    }
}

const PETS: Relation<Owner, Pet> = Relation::new("pets", |o| &mut o.pets);
const CARS: Relation<Owner, Car> = Relation::new("cars", |o| &mut o.cars);

fn ids<T>(records: &Option<Vec<T>>, id: impl Fn(&T) -> i64) -> Vec<i64> {
    records.as_ref().map(|r| r.iter().map(id).collect()).unwrap_or_default()
}

#[test]
fn test_two_relations_in_one_query() -> Result<()> {
    let db = get_test_db()?;
    db.create::<Owner>(Policy::DROP_TABLE)?;
    db.table::<Owner>()?.insert(&[1, 2, 3].map(|id| Owner { id, pets: None, cars: None }))?;
    db.table::<Pet>()?.insert(&[(10, 1), (11, 1), (12, 2)].map(|(id, owner_id)| Pet { id, owner_id }))?;
    db.table::<Car>()?.insert(&[(20, 1), (21, 1), (22, 1), (23, 2)].map(|(id, owner_id)| Car { id, owner_id }))?;

    let query = db.table::<Owner>()?
        .order_by("id")
        .join(PETS, "id", "ownerId")?
        .order_by("id")
        .join(CARS, "id", "ownerId")?
        .order_by("id");

    // Owner 1 comes back as a 2 x 3 cross product of rows
    assert_eq!(query.count()?, 2);
    let owners = query.select()?;
    assert_eq!(owners.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(ids(&owners[0].pets, |p| p.id), vec![10, 11]);
    assert_eq!(ids(&owners[0].cars, |c| c.id), vec![20, 21, 22]);
    assert_eq!(ids(&owners[1].pets, |p| p.id), vec![12]);
    assert_eq!(ids(&owners[1].cars, |c| c.id), vec![23]);
    assert!(owners.iter().all(|o| o.pets.iter().flatten().all(|p| p.owner_id == o.id)));
    assert!(owners.iter().all(|o| o.cars.iter().flatten().all(|c| c.owner_id == o.id)));

    let paged = query.clone().limit(1, 1);
    assert_eq!(paged.count()?, 1);
    let owners = paged.select()?;
    assert_eq!(owners.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2]);
    assert_eq!(ids(&owners[0].cars, |c| c.id), vec![23]);

    let filtered = query.filter(field::<Car>("id").eq(21));
    assert_eq!(filtered.count()?, 1);
    assert_eq!(ids(&filtered.select()?[0].pets, |p| p.id), vec![10, 11]);
    Ok(())
}

#[test]
fn test_same_table_cannot_be_joined_twice() -> Result<()> {
    let db = get_test_db()?;
    db.create::<Owner>(Policy::DROP_TABLE)?;
    let once = db.table::<Owner>()?.join(PETS, "id", "ownerId")?;
    assert!(matches!(once.join(PETS, "id", "ownerId"), Err(QueryError::MalformedExpression(_))));
    Ok(())
}
