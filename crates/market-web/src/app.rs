//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::pages::{
    AdminDashboard, BuyerDashboard, CheckoutPage, CoffeePage, HomePage, PaymentSuccessPage,
    SellerDashboard,
};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <nav class="topbar">
                <a href="/" class="brand">"☕ Coffee Market"</a>
                <a href="/dashboard/buyer">"My purchases"</a>
                <a href="/dashboard/seller">"Sell"</a>
                <a href="/dashboard/admin">"Admin"</a>
            </nav>
            <main class="app">
                <Routes fallback=|| view! { <p>"Page not found"</p> }>
                    <Route path=path!("/") view=HomePage />
                    <Route path=path!("/checkout") view=CheckoutPage />
                    <Route path=path!("/coffee/:id") view=CoffeePage />
                    <Route path=path!("/payment/success") view=PaymentSuccessPage />
                    <Route path=path!("/dashboard/buyer") view=BuyerDashboard />
                    <Route path=path!("/dashboard/seller") view=SellerDashboard />
                    <Route path=path!("/dashboard/admin") view=AdminDashboard />
                </Routes>
            </main>
        </Router>
    }
}
