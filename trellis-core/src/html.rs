//! Tag shorthands.
//!
//! One builder per common element, each equivalent to
//! [`node`](crate::vnode::node) with a fixed tag:
//!
//! ```rust
//! use trellis_core::html::{li, ul};
//! use trellis_core::vnode::Props;
//!
//! let list = ul(Props::new(), (li(Props::new(), "a"), li(Props::new(), "b")));
//! assert_eq!(list.tag(), "ul");
//! assert_eq!(list.children()[1].tag(), "li");
//! ```
//!
//! Tags outside this list go through `node` directly.

use crate::vnode::{node, IntoChildren, Props, VNode};

macro_rules! tags {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Build a `<", stringify!($name), ">` element.")]
            pub fn $name(props: Props, children: impl IntoChildren) -> VNode {
                node(stringify!($name), props, children)
            }
        )*

        /// Every tag with a shorthand in this module.
        pub const TAGS: &[&str] = &[$(stringify!($name)),*];
    };
}

tags!(
    a, article, aside, button, div, footer, form, h1, h2, h3, header, img, input, label, li, main,
    nav, ol, option, p, section, select, span, strong, table, tbody, td, textarea, th, thead, tr,
    ul,
);
