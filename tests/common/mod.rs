//! Shared entities and row fixtures for the integration tests.
//!
//! Relations here are acyclic: resolving a related field resolves the fetched
//! entities' own related fields too.

#![allow(dead_code)]

use fake::faker::name::en::Name;
use fake::Fake;
use relmap::{Entity, EntityBuilder, JoinKind, Row};
use sea_query::Value;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub deleted: i8,
}

impl Entity for Customer {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_customer");
        b.column("id", "id", |c| &c.id, |c| &mut c.id).key().auto_increment();
        b.column("name", "name", |c| &c.name, |c| &mut c.name);
        b.column("deleted", "deleted", |c| &c.deleted, |c| &mut c.deleted)
            .soft_delete("0", "1");
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
}

impl Entity for Item {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_item");
        b.column("id", "id", |i| &i.id, |i| &mut i.id).key();
        b.column("order_id", "order_id", |i| &i.order_id, |i| &mut i.order_id);
        b.column("sku", "sku", |i| &i.sku, |i| &mut i.sku);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub note: Option<String>,
    pub customer: Option<Customer>,
    pub items: Vec<Item>,
}

impl Entity for Order {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_order");
        b.column("id", "id", |o| &o.id, |o| &mut o.id).key();
        b.column("customer_id", "customer_id", |o| &o.customer_id, |o| &mut o.customer_id);
        b.column("note", "note", |o| &o.note, |o| &mut o.note);
        b.related_one("customer", "customer_id", "id", |o: &mut Order| &mut o.customer);
        b.related_many("items", "id", "order_id", |o: &mut Order| &mut o.items);
    }
}

/// Refers to a customer through a text column holding the numeric id
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub customer_ref: String,
    pub customer: Option<Customer>,
}

impl Entity for Ticket {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_ticket");
        b.column("id", "id", |t| &t.id, |t| &mut t.id).key();
        b.column("customer_ref", "customer_ref", |t| &t.customer_ref, |t| &mut t.customer_ref);
        b.related_one("customer", "customer_ref", "id", |t: &mut Ticket| &mut t.customer);
    }
}

/// Customers come from the `customers` data service
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub customer_id: i64,
    pub customer: Option<Customer>,
}

impl Entity for Review {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_review");
        b.column("id", "id", |r| &r.id, |r| &mut r.id).key();
        b.column("customer_id", "customer_id", |r| &r.customer_id, |r| &mut r.customer_id);
        b.related_one("customer", "customer_id", "id", |r: &mut Review| &mut r.customer)
            .data_service("customers");
    }
}

/// Items filtered by an extra predicate with an ORDER BY tail
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Basket {
    pub id: i64,
    pub items: Vec<Item>,
}

impl Entity for Basket {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_basket");
        b.column("id", "id", |k| &k.id, |k| &mut k.id).key();
        b.related_many("items", "id", "order_id", |k: &mut Basket| &mut k.items)
            .extra_where("WHERE `sku` LIKE 'A%' ORDER BY `id` DESC");
    }
}

/// Parent with its own related field
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Owned {
    pub owner_id: i64,
    pub owner: Option<Customer>,
}

impl Entity for Owned {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.table("t_note");
        b.column("owner_id", "owner_id", |o| &o.owner_id, |o| &mut o.owner_id);
        b.related_one("owner", "owner_id", "id", |o: &mut Owned| &mut o.owner);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Note {
    pub base: Owned,
    pub id: i64,
    pub text: String,
}

impl Entity for Note {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.extends(|n: &Note| &n.base, |n: &mut Note| &mut n.base);
        b.column("id", "id", |n| &n.id, |n| &mut n.id).key();
        b.column("text", "text", |n| &n.text, |n| &mut n.text);
    }
}

/// Customers left-joined with their orders
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CustomerOrder {
    pub customer: Option<Customer>,
    pub order: Option<Order>,
}

impl Entity for CustomerOrder {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.join(
            JoinKind::Left,
            "t1.`id` = t2.`customer_id`",
            |p: &mut CustomerOrder| &mut p.customer,
            |p: &mut CustomerOrder| &mut p.order,
        );
    }
}

pub fn customer_row(id: i64, name: &str) -> Row {
    Row::new().with("id", id).with("name", name).with("deleted", 0i8)
}

pub fn order_row(id: i64, customer_id: Option<i64>) -> Row {
    Row::new()
        .with("id", id)
        .with("customer_id", customer_id)
        .with("note", Value::String(None))
}

pub fn item_row(id: i64, order_id: i64, sku: &str) -> Row {
    Row::new().with("id", id).with("order_id", order_id).with("sku", sku)
}

/// `count` customers with ids `1..=count` and generated names
pub fn fake_customers(count: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| {
            let name: String = Name().fake();
            customer_row(id, &name)
        })
        .collect()
}

/// `count` orders pointing at random customers in `1..=customers`
pub fn fake_orders(count: i64, customers: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| order_row(id, Some((1..=customers).fake::<i64>())))
        .collect()
}

/// Rows whose `column` equals one of `params`
pub fn rows_in(rows: &[Row], column: &str, params: &[Value]) -> Vec<Row> {
    rows.iter()
        .filter(|row| row.get(column).is_some_and(|value| params.contains(value)))
        .cloned()
        .collect()
}
