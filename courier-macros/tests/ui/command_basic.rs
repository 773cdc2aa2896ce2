use courier_application::command::Command;
use courier_macros::command;

#[command]
struct ArchiveOrder {
    order_id: u64,
}

#[command(name = "invoice.render", output = Vec<u8>)]
struct RenderInvoice {
    invoice_id: u64,
}

fn output_of<C: Command>(_c: &C) -> &'static str {
    std::any::type_name::<C::Output>()
}

fn main() {
    assert_eq!(ArchiveOrder::NAME, "ArchiveOrder");
    assert_eq!(RenderInvoice::NAME, "invoice.render");
    assert_eq!(output_of(&ArchiveOrder { order_id: 1 }), "()");
    assert!(output_of(&RenderInvoice { invoice_id: 2 }).contains("Vec<u8>"));
}
