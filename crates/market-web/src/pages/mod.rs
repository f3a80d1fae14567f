//! Page Components

mod admin;
mod buyer;
mod checkout;
mod coffee;
mod home;
mod payment_success;
mod seller;

pub use admin::AdminDashboard;
pub use buyer::BuyerDashboard;
pub use checkout::CheckoutPage;
pub use coffee::CoffeePage;
pub use home::HomePage;
pub use payment_success::PaymentSuccessPage;
pub use seller::SellerDashboard;
