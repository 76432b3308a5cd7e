use crate::batch::RegionsConfig;

/// Print every region with its product types and exchanges.
pub fn list_regions(config: &RegionsConfig) {
    println!("\nAvailable Regions:");
    println!("{}", "-".repeat(40));
    for region in config.regions() {
        println!("  - {region}");
        if let Ok(products) = config.product_types(&region) {
            for product in products {
                let exchanges = config.exchanges(&region, &product);
                println!("    {product}: {}", exchanges.join(", "));
            }
        }
    }
    println!();
}
