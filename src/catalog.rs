use crate::models::catalog::{ Category, Product, ALL_CATEGORIES };
use once_cell::sync::Lazy;

pub const NO_RESULTS_MESSAGE: &str = "No products found matching your criteria.";

/// Keeps products whose name contains `query` (case-insensitive) and whose
/// category label equals `category`, or every category when it is `"All"`.
/// Input order is preserved.
pub fn filter<'a, I>(products: I, query: &str, category: &str) -> Vec<&'a Product>
    where I: IntoIterator<Item = &'a Product>
{
    let needle = query.to_lowercase();
    products
        .into_iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .filter(|p| category == ALL_CATEGORIES || p.category.label() == category)
        .collect()
}

/// Selector labels in display order, wildcard first.
pub fn category_labels() -> Vec<&'static str> {
    std::iter
        ::once(ALL_CATEGORIES)
        .chain(Category::ALL.iter().map(|c| c.label()))
        .collect()
}

fn product(
    id: u32,
    name: &str,
    category: Category,
    (price, original_price): (u32, u32),
    (rating, review_count): (f32, u32),
    in_stock: bool,
    prescription_required: bool,
    image: &str
) -> Product {
    Product {
        id,
        name: name.to_string(),
        category,
        price,
        original_price,
        rating,
        review_count,
        in_stock,
        prescription_required,
        image: image.to_string(),
    }
}

static BUILTIN: Lazy<Vec<Product>> = Lazy::new(|| {
    vec![
        product(
            1,
            "Paracetamol 500mg",
            Category::Medicines,
            (45, 55),
            (4.8, 128),
            true,
            true,
            "https://in.pinterest.com/pin/401101910580333552/"
        ),
        product(
            2,
            "Vitamin D3 Supplements",
            Category::Supplements,
            (299, 399),
            (4.6, 89),
            true,
            false,
            "https://in.pinterest.com/pin/948992952733359531/"
        ),
        product(
            3,
            "Digital Thermometer",
            Category::Equipment,
            (199, 249),
            (4.9, 156),
            true,
            false,
            "https://in.pinterest.com/pin/346073552629215264/"
        ),
        product(
            4,
            "Hand Sanitizer 500ml",
            Category::PersonalCare,
            (89, 120),
            (4.5, 234),
            true,
            false,
            "https://in.pinterest.com/pin/47287864827467884/"
        ),
        product(
            5,
            "Blood Pressure Monitor",
            Category::Equipment,
            (1299, 1599),
            (4.7, 67),
            true,
            false,
            "https://in.pinterest.com/pin/637400153550481710/"
        ),
        product(
            6,
            "Omega 3 Fish Oil",
            Category::Supplements,
            (549, 699),
            (4.8, 112),
            false,
            false,
            "https://in.pinterest.com/pin/4591982893500436480/"
        )
    ]
});

/// The hard-coded storefront catalog. Read-only.
pub fn builtin() -> &'static [Product] {
    &BUILTIN
}
