use proc_macro::TokenStream;
use quote::quote;
use syn::{Item, parse_macro_input};

mod message;
mod utils;

use message::{MessageAttrConfig, prepare};

/// 事件宏
/// - 追加派生：`Debug, Clone, serde::Serialize, serde::Deserialize`（与已有派生合并去重）
/// - 自动实现 `::courier_domain::event::Event`
/// - 支持参数：`#[event(name = "order.placed")]`，默认使用类型名
#[proc_macro_attribute]
pub fn event(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as MessageAttrConfig);
    let input = parse_macro_input!(item as Item);

    if let Some(output) = &cfg.output {
        return syn::Error::new_spanned(output, "#[event] does not take 'output'")
            .to_compile_error()
            .into();
    }

    let (item, ident, generics, name) = match prepare(input, "event", cfg.name) {
        Ok(v) => v,
        Err(e) => return e.to_compile_error().into(),
    };
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        #item

        impl #impl_generics ::courier_domain::event::Event for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
        }
    };

    TokenStream::from(expanded)
}

/// 命令宏
/// - 追加派生：`Debug, Clone, serde::Serialize, serde::Deserialize`，便于进入作业队列持久化
/// - 自动实现 `::courier_application::command::Command`
/// - 支持参数：`#[command(name = "email.send", output = Receipt)]`，
///   `name` 默认使用类型名，`output` 默认 `()`
#[proc_macro_attribute]
pub fn command(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as MessageAttrConfig);
    let input = parse_macro_input!(item as Item);

    let output = cfg.output.unwrap_or_else(|| syn::parse_quote! { () });
    let (item, ident, generics, name) = match prepare(input, "command", cfg.name) {
        Ok(v) => v,
        Err(e) => return e.to_compile_error().into(),
    };
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        #item

        impl #impl_generics ::courier_application::command::Command for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
            type Output = #output;
        }
    };

    TokenStream::from(expanded)
}
