//! Seller Dashboard

use leptos::prelude::*;

use crate::api;
use crate::components::{ErrorText, SessionForm};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    Products,
    Coffee,
}

#[component]
pub fn SellerDashboard() -> impl IntoView {
    let (tab, set_tab) = signal(Tab::Products);

    view! {
        <div class="dashboard seller">
            <h1>"Seller dashboard"</h1>
            <div class="tabs">
                <button
                    class:active=move || tab.get() == Tab::Products
                    on:click=move |_| set_tab.set(Tab::Products)
                >
                    "Products"
                </button>
                <button
                    class:active=move || tab.get() == Tab::Coffee
                    on:click=move |_| set_tab.set(Tab::Coffee)
                >
                    "Coffee link"
                </button>
            </div>
            {move || match tab.get() {
                Tab::Products => view! { <ProductsTab /> }.into_any(),
                Tab::Coffee => view! { <CoffeeTab /> }.into_any(),
            }}
        </div>
    }
}

#[component]
fn ProductsTab() -> impl IntoView {
    let (products, set_products) = signal(None::<Result<Vec<api::SellerProduct>, String>>);
    let (version, set_version) = signal(0u32);
    let refresh = move || set_version.update(|v| *v += 1);

    Effect::new(move |_| {
        version.track();
        leptos::task::spawn_local(async move {
            set_products.set(Some(api::seller_products().await));
        });
    });

    view! {
        <NewProductForm on_created=refresh />
        {move || match products.get() {
            None => view! { <p class="loading">"Loading products..."</p> }.into_any(),
            Some(Err(e)) => view! { <p class="error">{e}</p> <SessionForm /> }.into_any(),
            Some(Ok(list)) if list.is_empty() => {
                view! { <p class="empty">"You have not listed anything yet"</p> }.into_any()
            }
            Some(Ok(list)) => view! {
                <table class="seller-products">
                    <thead>
                        <tr>
                            <th>"Title"</th>
                            <th>"Price"</th>
                            <th>"Status"</th>
                            <th>"Sales"</th>
                            <th>"Revenue"</th>
                            <th>"Views"</th>
                            <th></th>
                        </tr>
                    </thead>
                    <tbody>
                        {list
                            .into_iter()
                            .map(|item| view! { <SellerRow item=item on_published=refresh /> })
                            .collect_view()}
                    </tbody>
                </table>
            }
                .into_any(),
        }}
    }
}

#[component]
fn SellerRow(
    item: api::SellerProduct,
    on_published: impl Fn() + Copy + Send + Sync + 'static,
) -> impl IntoView {
    let (error, set_error) = signal(None::<String>);
    let approved = item.product.status == "APPROVED";

    let id = item.product.id.clone();
    let publish = move |_| {
        let id = id.clone();
        leptos::task::spawn_local(async move {
            match api::publish_product(&id).await {
                Ok(_) => on_published(),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    view! {
        <tr>
            <td>{item.product.title}</td>
            <td>"$"{item.product.price}</td>
            <td>{item.product.status}</td>
            <td>{item.analytics.sales_count}</td>
            <td>"$"{item.analytics.revenue}</td>
            <td>{item.analytics.views}</td>
            <td>
                <Show when=move || approved>
                    <button class="btn btn-primary" on:click=publish.clone()>"Publish"</button>
                </Show>
                <ErrorText error=error />
            </td>
        </tr>
    }
}

#[component]
fn NewProductForm(on_created: impl Fn() + Copy + Send + Sync + 'static) -> impl IntoView {
    let (title, set_title) = signal(String::new());
    let (price, set_price) = signal(String::new());
    let (file_url, set_file_url) = signal(String::new());
    let (error, set_error) = signal(None::<String>);

    let submit = move |_| {
        let (t, p, f) = (title.get(), price.get(), file_url.get());
        set_error.set(None);
        leptos::task::spawn_local(async move {
            match api::create_product(t.trim(), p.trim(), f.trim()).await {
                Ok(_) => {
                    set_title.set(String::new());
                    set_price.set(String::new());
                    set_file_url.set(String::new());
                    on_created();
                }
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    view! {
        <section class="new-product">
            <h2>"List a product"</h2>
            <p class="hint">"New listings are reviewed by an admin before you can publish them"</p>
            <div class="field">
                <label>"Title"</label>
                <input
                    type="text"
                    prop:value=move || title.get()
                    on:input=move |ev| set_title.set(event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"Price (USD)"</label>
                <input
                    type="number"
                    min="0.01"
                    step="0.01"
                    prop:value=move || price.get()
                    on:input=move |ev| set_price.set(event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"File URL"</label>
                <input
                    type="text"
                    prop:value=move || file_url.get()
                    on:input=move |ev| set_file_url.set(event_target_value(&ev))
                />
            </div>
            <button class="btn btn-primary" on:click=submit>"Submit for review"</button>
            <ErrorText error=error />
        </section>
    }
}

#[component]
fn CoffeeTab() -> impl IntoView {
    let (link, set_link) = signal(None::<Result<api::CoffeeLink, String>>);
    let (donations, set_donations) = signal(Vec::<api::Donation>::new());
    let (error, set_error) = signal(None::<String>);

    leptos::task::spawn_local(async move {
        set_link.set(Some(api::my_coffee_link().await));
        if let Ok(list) = api::recent_donations().await {
            set_donations.set(list);
        }
    });

    let generate = move |_| {
        set_error.set(None);
        leptos::task::spawn_local(async move {
            match api::generate_coffee_link().await {
                Ok(created) => set_link.set(Some(Ok(created))),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    let share_url = move || {
        link.get()
            .and_then(Result::ok)
            .map(|l| format!("{}/coffee/{}", api::origin(), l.coffee_link))
    };

    view! {
        <section class="coffee-link">
            {move || match share_url() {
                Some(url) => view! {
                    <p>"Share your link:"</p>
                    <a class="share" href=url.clone()>{url.clone()}</a>
                }
                    .into_any(),
                None => view! { <p>"You do not have a coffee link yet"</p> }.into_any(),
            }}
            <button class="btn" on:click=generate>
                {move || if share_url().is_some() { "Regenerate link" } else { "Create link" }}
            </button>
            <ErrorText error=error />

            <h2>"Recent coffees"</h2>
            <For
                each=move || donations.get()
                key=|d| d.reference.clone()
                children=move |d| {
                    view! {
                        <div class="donation">
                            <strong>{d.donor_name.unwrap_or_else(|| "Someone".into())}</strong>
                            " - " {d.amount} " " {d.currency} " (" {d.status} ")"
                            {d.donor_message.map(|m| view! { <p class="message">{m}</p> })}
                        </div>
                    }
                }
            />
        </section>
    }
}
