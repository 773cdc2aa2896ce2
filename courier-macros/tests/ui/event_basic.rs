use courier_domain::event::Event;
use courier_macros::event;

#[event]
struct InventoryAdjusted {
    sku: String,
    delta: i64,
}

fn assert_serde<T: serde::Serialize + serde::de::DeserializeOwned>() {}

fn main() {
    assert_eq!(InventoryAdjusted::NAME, "InventoryAdjusted");
    assert_serde::<InventoryAdjusted>();
    let e = InventoryAdjusted {
        sku: "A-1".into(),
        delta: -2,
    };
    let copy = e.clone();
    assert!(format!("{copy:?}").contains("A-1"));
    assert_eq!(e.delta, -2);
}
