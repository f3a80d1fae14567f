//! Home Page

use leptos::prelude::*;

use crate::api;
use crate::components::ProductCard;

#[component]
pub fn HomePage() -> impl IntoView {
    let (products, set_products) = signal(None::<Result<Vec<api::Product>, String>>);

    leptos::task::spawn_local(async move {
        set_products.set(Some(api::list_products().await));
    });

    view! {
        <div class="home">
            <header class="hero">
                <h1>"Coffee Market"</h1>
                <p class="tagline">"Digital goods from independent creators"</p>
                <div class="cta">
                    <a href="/dashboard/seller" class="btn">"Start selling"</a>
                    <a href="/checkout" class="btn">"Buy a creator a coffee"</a>
                </div>
            </header>

            <section class="products">
                {move || match products.get() {
                    None => view! { <p class="loading">"Loading products..."</p> }.into_any(),
                    Some(Err(e)) => view! { <p class="error">{e}</p> }.into_any(),
                    Some(Ok(list)) if list.is_empty() => {
                        view! { <p class="empty">"No products for sale yet"</p> }.into_any()
                    }
                    Some(Ok(list)) => list
                        .into_iter()
                        .map(|product| view! { <ProductCard product=product /> })
                        .collect_view()
                        .into_any(),
                }}
            </section>
        </div>
    }
}
