//! Join pairs: joined SQL, row splitting and per-side resolution.

mod common;

use common::*;
use relmap::test_helpers::{found_rows, MockExecutor};
use relmap::{DbHelper, Entity, EntityBuilder, JoinKind, Row};
use sea_query::Value;
use std::sync::Arc;

fn joined_row(customer: Option<(i64, &str)>, order: Option<(i64, i64)>) -> Row {
    let mut row = Row::new();
    match customer {
        Some((id, name)) => {
            row.push("t1.id", id);
            row.push("t1.name", name);
            row.push("t1.deleted", 0i8);
        }
        None => {
            row.push("t1.id", Value::BigInt(None));
            row.push("t1.name", Value::String(None));
            row.push("t1.deleted", Value::TinyInt(None));
        }
    }
    match order {
        Some((id, customer_id)) => {
            row.push("t2.id", id);
            row.push("t2.customer_id", customer_id);
            row.push("t2.note", Value::String(None));
        }
        None => {
            row.push("t2.id", Value::BigInt(None));
            row.push("t2.customer_id", Value::BigInt(None));
            row.push("t2.note", Value::String(None));
        }
    }
    row
}

fn join_db(rows: Vec<Row>) -> Arc<MockExecutor> {
    Arc::new(MockExecutor::with_responder(move |sql, params| {
        if sql == "SELECT FOUND_ROWS()" {
            vec![found_rows(rows.len() as i64)]
        } else if sql.contains("AS `t1`") {
            rows.clone()
        } else if sql.contains("FROM `t_customer`") {
            rows_in(&fake_customers(20), "id", params)
        } else if sql.contains("FROM `t_item`") {
            params
                .iter()
                .filter_map(|value| match value {
                    Value::BigInt(Some(order_id)) => Some(item_row(order_id * 10, *order_id, "A-1")),
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        }
    }))
}

#[test]
fn test_join_sql_places_soft_delete_by_side() {
    let mock = join_db(Vec::new());
    let db = DbHelper::new(Arc::clone(&mock));

    db.get_page::<CustomerOrder>(1, 20, "ORDER BY t1.`id`", &[]).unwrap();

    let sql = &mock.calls()[0].0;
    assert!(sql.starts_with("SELECT SQL_CALC_FOUND_ROWS `t1`.`id` AS `t1.id`"));
    assert!(sql.contains("`t2`.`customer_id` AS `t2.customer_id`"));
    assert!(sql.contains("FROM `t_customer` AS `t1` LEFT JOIN `t_order` AS `t2`"));
    assert!(sql.contains("t1.`id` = t2.`customer_id`"));
    assert!(sql.ends_with("WHERE t1.`deleted` = '0' ORDER BY t1.`id` LIMIT 0,20"));
}

#[derive(Debug, Default, Clone, PartialEq)]
struct OrderCustomer {
    order: Option<Order>,
    customer: Option<Customer>,
}

impl Entity for OrderCustomer {
    fn describe(b: &mut EntityBuilder<Self>) {
        b.join(
            JoinKind::Right,
            "t1.`customer_id` = t2.`id`",
            |p: &mut OrderCustomer| &mut p.order,
            |p: &mut OrderCustomer| &mut p.customer,
        );
    }
}

#[test]
fn test_right_join_filters_the_preserved_side_in_where() {
    let mock = Arc::new(MockExecutor::new());
    let db = DbHelper::new(Arc::clone(&mock));

    db.get_all::<OrderCustomer>().unwrap();

    let sql = &mock.calls()[0].0;
    assert!(sql.contains("FROM `t_order` AS `t1` RIGHT JOIN `t_customer` AS `t2`"));
    assert!(sql.ends_with(" WHERE t2.`deleted` = '0'"));
}

#[test]
fn test_rows_split_into_sides() {
    let mock = join_db(vec![
        joined_row(Some((1, "ann")), Some((10, 1))),
        joined_row(Some((2, "bob")), None),
    ]);
    let db = DbHelper::new(Arc::clone(&mock));

    let page = db.get_page::<CustomerOrder>(1, 20, "", &[]).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.data[0].customer.as_ref().map(|c| c.name.as_str()), Some("ann"));
    assert_eq!(page.data[0].order.as_ref().map(|o| o.id), Some(10));
    assert_eq!(page.data[1].customer.as_ref().map(|c| c.id), Some(2));
    assert!(page.data[1].order.is_none());
}

#[test]
fn test_sides_resolve_their_own_related_fields() {
    let mock = join_db(vec![
        joined_row(Some((1, "ann")), Some((10, 3))),
        joined_row(Some((2, "bob")), Some((11, 4))),
        joined_row(Some((3, "cy")), None),
    ]);
    let db = DbHelper::new(Arc::clone(&mock));

    let pairs = db.get_all::<CustomerOrder>().unwrap();

    let first = pairs[0].order.as_ref().unwrap();
    assert_eq!(first.customer.as_ref().map(|c| c.id), Some(3));
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].order_id, 10);
    assert_eq!(pairs[1].order.as_ref().unwrap().items[0].id, 110);

    // one joined query, then one query per related field of the order side
    assert_eq!(mock.query_count(), 3);
    let (_, params) = mock
        .calls()
        .into_iter()
        .find(|(sql, _)| sql.contains("FROM `t_item`"))
        .unwrap();
    assert_eq!(params, vec![Value::BigInt(Some(10)), Value::BigInt(Some(11))]);
}
