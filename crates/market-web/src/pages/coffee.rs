//! Public Coffee Link Page

use leptos::prelude::*;
use leptos_router::hooks::use_params_map;

use crate::api;
use crate::components::DonateForm;

const PRESET_AMOUNTS: [u32; 4] = [500, 1000, 2500, 5000];

#[component]
pub fn CoffeePage() -> impl IntoView {
    let params = use_params_map();
    let slug = params.with_untracked(|p| p.get("id").unwrap_or_default());
    let (link, set_link) = signal(None::<Result<api::CoffeeLink, String>>);

    let lookup = slug.clone();
    leptos::task::spawn_local(async move {
        set_link.set(Some(api::public_coffee_link(&lookup).await));
    });

    view! {
        <div class="coffee">
            {move || match link.get() {
                None => view! { <p class="loading">"Loading..."</p> }.into_any(),
                Some(Err(e)) => view! { <p class="error">{e}</p> }.into_any(),
                Some(Ok(link)) => {
                    let creator = link
                        .creator_name
                        .clone()
                        .unwrap_or_else(|| "this creator".into());
                    view! {
                        <header>
                            <h1>{link.title.clone()}</h1>
                            <p class="description">{link.description.clone()}</p>
                            <p class="creator">"Support " {creator}</p>
                        </header>
                        <DonateForm coffee_link_id=link.coffee_link presets=PRESET_AMOUNTS.to_vec() />
                    }
                        .into_any()
                }
            }}
        </div>
    }
}
