mod common;

use common::{shop_context, Customer, Order};
use miniorm_core::{MappingError, OrmError, Value};

#[test]
fn freshly_loaded_sets_report_no_changes() {
    let context = shop_context();

    for count in [
        context.set::<Order>().unwrap().change_tracker().added().len(),
        context.set::<Order>().unwrap().change_tracker().removed().len(),
        context.set::<Order>().unwrap().modified().unwrap().len(),
        context.set::<Customer>().unwrap().modified().unwrap().len(),
    ] {
        assert_eq!(count, 0);
    }
    assert_eq!(context.set::<Order>().unwrap().change_tracker().snapshot_len(), 4);
}

#[test]
fn single_field_change_marks_only_that_entity() {
    let context = shop_context();
    let orders = context.set::<Order>().unwrap();

    let second = orders.find_by_key(&[Value::from(2)]).unwrap();
    second.borrow_mut().total = 25.0;

    let modified = orders.modified().unwrap();
    assert_eq!(modified.len(), 1);
    assert!(modified[0].ptr_eq(&second));
}

#[test]
fn several_changes_on_one_entity_report_it_once() {
    let context = shop_context();
    let orders = context.set::<Order>().unwrap();

    let first = orders.find_by_key(&[Value::from(1)]).unwrap();
    {
        let mut order = first.borrow_mut();
        order.total = 11.0;
        order.note = Some("rush".to_string());
    }

    assert_eq!(orders.modified().unwrap(), vec![first]);
}

#[test]
fn null_on_both_sides_is_not_a_change() {
    let context = shop_context();
    let orders = context.set::<Order>().unwrap();

    let first = orders.find_by_key(&[Value::from(1)]).unwrap();
    first.borrow_mut().note = Some("temporary".to_string());
    first.borrow_mut().note = None;
    assert!(orders.modified().unwrap().is_empty());

    first.borrow_mut().note = Some("kept".to_string());
    assert_eq!(orders.modified().unwrap().len(), 1);
}

#[test]
fn reverting_a_change_clears_the_modification() {
    let context = shop_context();
    let customers = context.set::<Customer>().unwrap();

    let ada = customers.find_by_key(&[Value::from(7)]).unwrap();
    ada.borrow_mut().name = "Ada L.".to_string();
    assert_eq!(customers.modified().unwrap().len(), 1);

    ada.borrow_mut().name = "Ada".to_string();
    assert!(customers.modified().unwrap().is_empty());
}

#[test]
fn relation_fields_are_not_diffed() {
    let context = shop_context();

    let order = context
        .set::<Order>()
        .unwrap()
        .find_by_key(&[Value::from(3)])
        .unwrap();
    order.borrow_mut().customer_id = Some(7);
    context.refresh_relations().unwrap();

    // Only the foreign-key column changed; the rewired collections are ignored.
    let customers = context.set::<Customer>().unwrap();
    assert!(customers.modified().unwrap().is_empty());
    assert_eq!(customers.find_by_key(&[Value::from(7)]).unwrap().borrow().orders.len(), 3);
    assert_eq!(context.set::<Order>().unwrap().modified().unwrap(), vec![order]);
}

#[test]
fn added_entities_are_never_modified() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let added = orders.add(Order {
        id: 50,
        total: 3.0,
        ..Order::default()
    });
    added.borrow_mut().total = 4.0;

    assert_eq!(orders.len(), 5);
    assert_eq!(orders.change_tracker().added(), &[added.clone()]);
    assert!(orders.modified().unwrap().is_empty());
    assert!(orders.contains(&added));
}

#[test]
fn removed_entities_are_never_modified() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let second = orders.find_by_key(&[Value::from(2)]).unwrap();
    second.borrow_mut().total = 99.0;
    assert!(orders.remove(&second));

    assert!(orders.modified().unwrap().is_empty());
    assert_eq!(orders.change_tracker().removed(), &[second.clone()]);
    assert!(!orders.contains(&second));
    assert!(!orders.remove(&second));
}

#[test]
fn removing_an_added_entity_forgets_it() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let added = orders.add(Order {
        id: 60,
        ..Order::default()
    });
    assert!(orders.remove(&added));

    assert!(orders.change_tracker().added().is_empty());
    assert!(orders.change_tracker().removed().is_empty());
}

#[test]
fn re_adding_a_removed_entity_restores_it() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let first = orders.find_by_key(&[Value::from(1)]).unwrap();
    assert!(orders.remove(&first));
    assert!(orders.add_ref(first.clone()));
    assert!(!orders.add_ref(first.clone()));

    assert!(orders.change_tracker().added().is_empty());
    assert!(orders.change_tracker().removed().is_empty());
    assert!(orders.modified().unwrap().is_empty());
}

#[test]
fn remove_range_is_all_or_nothing() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let first = orders.find_by_key(&[Value::from(1)]).unwrap();
    let second = orders.find_by_key(&[Value::from(2)]).unwrap();
    let third = orders.find_by_key(&[Value::from(3)]).unwrap();
    assert!(orders.remove(&third));

    assert!(!orders.remove_range(&[first.clone(), third.clone()]));
    assert!(!orders.remove_range(&[first.clone(), first.clone()]));
    assert_eq!(orders.len(), 3);
    assert_eq!(orders.change_tracker().removed().len(), 1);

    assert!(orders.remove_range(&[first.clone(), second.clone()]));
    assert_eq!(orders.len(), 1);
    assert_eq!(orders.change_tracker().removed().len(), 3);
}

#[test]
fn clear_routes_every_entity_through_removal() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();

    let added = orders.add(Order {
        id: 70,
        ..Order::default()
    });
    orders.clear();

    assert!(orders.is_empty());
    assert!(!orders.change_tracker().removed().contains(&added));
    assert_eq!(orders.change_tracker().removed().len(), 4);
    assert!(orders.change_tracker().added().is_empty());
}

#[test]
fn iteration_follows_load_then_insertion_order() {
    let mut context = shop_context();
    let orders = context.set_mut::<Order>().unwrap();
    orders.add(Order {
        id: 0,
        ..Order::default()
    });

    let ids: Vec<i64> = orders.iter().map(|order| order.borrow().id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 0]);

    let again: Vec<i64> = (&*orders).into_iter().map(|order| order.borrow().id).collect();
    assert_eq!(again, ids);
}

#[test]
fn rewritten_primary_key_is_a_mapping_error() {
    let context = shop_context();
    let orders = context.set::<Order>().unwrap();

    orders
        .find_by_key(&[Value::from(4)])
        .unwrap()
        .borrow_mut()
        .id = 40;

    let err = orders.modified().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::UnmatchedSnapshot { entity: "Order", .. })
    ));
}

#[test]
fn duplicated_primary_key_is_a_mapping_error() {
    let context = shop_context();
    let orders = context.set::<Order>().unwrap();

    orders
        .find_by_key(&[Value::from(2)])
        .unwrap()
        .borrow_mut()
        .id = 1;

    let err = orders.modified().unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::AmbiguousSnapshot { entity: "Order", .. })
    ));
}

#[test]
fn negative_zero_is_not_a_change() {
    let mut context = shop_context();
    let first = context
        .set::<Order>()
        .unwrap()
        .find_by_key(&[Value::from(1)])
        .unwrap();
    first.borrow_mut().total = 0.0;
    context.save_changes().unwrap();

    first.borrow_mut().total = -0.0;

    assert!(context.set::<Order>().unwrap().modified().unwrap().is_empty());
}
