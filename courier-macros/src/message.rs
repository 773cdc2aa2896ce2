use crate::utils::{apply_derives, message_derives};
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::{Ident, Item, LitStr, Result as SynResult, Token, Type};

// 解析键值参数：name = "..."、output = <Type>
pub(crate) struct MessageAttrConfig {
    pub(crate) name: Option<LitStr>,
    pub(crate) output: Option<Type>,
}

impl Parse for MessageAttrConfig {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let mut name: Option<LitStr> = None;
        let mut output: Option<Type> = None;

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            let _eq: Token![=] = input.parse()?;

            match key.to_string().as_str() {
                "name" => {
                    if name.is_some() {
                        return Err(syn::Error::new(
                            key.span(),
                            "duplicate key 'name' in attribute",
                        ));
                    }
                    name = Some(input.parse()?);
                }
                "output" => {
                    if output.is_some() {
                        return Err(syn::Error::new(
                            key.span(),
                            "duplicate key 'output' in attribute",
                        ));
                    }
                    output = Some(input.parse()?);
                }
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "unknown key in attribute; expected 'name' | 'output'",
                    ));
                }
            }

            if input.is_empty() {
                break;
            }
            let _comma: Token![,] = input.parse()?;
        }

        Ok(Self { name, output })
    }
}

/// 为结构体/枚举补齐派生，返回（处理后的条目，标识符，稳定名称）
pub(crate) fn prepare(
    item: Item,
    macro_name: &str,
    name: Option<LitStr>,
) -> SynResult<(Item, Ident, syn::Generics, LitStr)> {
    let (ident, generics, item) = match item {
        Item::Struct(mut s) => {
            apply_derives(&mut s.attrs, message_derives());
            (s.ident.clone(), s.generics.clone(), Item::Struct(s))
        }
        Item::Enum(mut e) => {
            apply_derives(&mut e.attrs, message_derives());
            (e.ident.clone(), e.generics.clone(), Item::Enum(e))
        }
        other => {
            return Err(syn::Error::new(
                other.span(),
                format!("#[{macro_name}] only on struct or enum"),
            ));
        }
    };

    let name = name.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    Ok((item, ident, generics, name))
}
