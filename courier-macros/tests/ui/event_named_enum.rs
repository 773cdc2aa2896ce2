use courier_domain::event::Event;
use courier_macros::event;

#[event(name = "shipment.changed")]
#[derive(PartialEq)]
enum ShipmentChanged {
    Dispatched { carrier: String },
    Delivered,
}

fn main() {
    assert_eq!(ShipmentChanged::NAME, "shipment.changed");
    assert_eq!(ShipmentChanged::Delivered, ShipmentChanged::Delivered.clone());
    let _ = ShipmentChanged::Dispatched {
        carrier: "dhl".into(),
    };
}
