use crate::field_dictionary::FieldSpec;
use crate::field_dictionary::ValueType::{
    Boolean, DateTime, Float, Integer, Json, Opaque, String, StringArray,
};

/// Canonical fields for the `properties` / `property_details` tables.
pub const PROPERTY_FIELDS: &[FieldSpec] = &[
    // -- properties -----------------------------------------------------------
    FieldSpec::primary(
        "external_id",
        String,
        &["Record Id", "id", "Property ID", "Zoho ID", "CRM ID"],
    )
    .identifier(),
    FieldSpec::primary("name", String, &["Property Name", "Title", "Listing Title"]),
    FieldSpec::primary("property_type", String, &["Property Type", "Type", "Unit Type"]),
    FieldSpec::primary("status", String, &["Listing Status", "Property Status"]),
    FieldSpec::primary(
        "address",
        String,
        &["Street", "Street Address", "Address Line 1"],
    ),
    FieldSpec::primary("unit_number", String, &["Unit", "Apt", "Suite"]),
    FieldSpec::primary("city", String, &[]),
    FieldSpec::primary("state", String, &["Province", "Region"]),
    FieldSpec::primary("zip_code", String, &["Zip", "Postal Code", "Postcode"]),
    FieldSpec::primary("country", String, &[]),
    FieldSpec::primary("monthly_rent", Float, &["Rent", "Price", "Rent Amount"]),
    FieldSpec::primary("bedrooms", Integer, &["Beds", "No of Bedrooms"]),
    FieldSpec::primary("bathrooms", Float, &["Baths"]),
    FieldSpec::primary("square_feet", Integer, &["Sq Ft", "SqFt", "Size"]),
    FieldSpec::primary(
        "available_from",
        DateTime,
        &["Availability Date", "Available Date"],
    ),
    FieldSpec::primary("is_published", Boolean, &["Published", "Live"]),
    FieldSpec::primary("associated_building", Json, &["Building"]),
    FieldSpec::primary("owner", Json, &["Property Owner", "Record Owner"]),
    FieldSpec::primary("created_by", Json, &[]),
    FieldSpec::primary("crm_created_at", DateTime, &["Created Time", "Created Date"]),
    FieldSpec::primary("crm_modified_at", DateTime, &["Modified Time", "Last Modified"]),
    // -- property_details -----------------------------------------------------
    FieldSpec::detail(
        "description",
        String,
        &["Property Description", "Listing Description"],
    ),
    FieldSpec::detail("has_pool", Boolean, &["Pool", "Swimming Pool"]),
    FieldSpec::detail("has_gym", Boolean, &["Gym", "Fitness Center"]),
    FieldSpec::detail("has_parking", Boolean, &["Parking", "Parking Available"]),
    FieldSpec::detail("has_den", Boolean, &["Den"])
        .with_boolean_overrides(&["den", "has den"], &["no den"]),
    FieldSpec::detail("has_balcony", Boolean, &["Balcony"]),
    FieldSpec::detail("has_dishwasher", Boolean, &["Dishwasher"]),
    FieldSpec::detail("has_air_conditioning", Boolean, &["Air Conditioning", "AC"]),
    FieldSpec::detail("pets_allowed", Boolean, &["Pet Friendly", "Pets"]),
    FieldSpec::detail("furnished", Boolean, &[]),
    FieldSpec::detail("smoking_allowed", Boolean, &[]),
    FieldSpec::detail("laundry", String, &["Laundry Type"]),
    FieldSpec::detail("floor_number", Integer, &["Floor"]),
    FieldSpec::detail(
        "lease_term_months",
        Integer,
        &["Lease Term", "Minimum Lease"],
    ),
    FieldSpec::detail("security_deposit", Float, &["Deposit"]),
    FieldSpec::detail("parking_spots", Integer, &["Parking Spaces"]),
    FieldSpec::detail("year_built", Integer, &[]),
    FieldSpec::detail("latitude", Float, &["Lat"]),
    FieldSpec::detail("longitude", Float, &["Lng", "Long"]),
    FieldSpec::detail("utilities_included", StringArray, &["Utilities"]),
    FieldSpec::detail("amenities", StringArray, &["Features"]),
    FieldSpec::detail("appliances", StringArray, &[]),
    FieldSpec::detail("photo_urls", StringArray, &["Photos", "Images"]),
    FieldSpec::detail("territory", Json, &["Territories"]),
    FieldSpec::detail("listing_agent", Json, &["Agent"]),
    FieldSpec::detail(
        "last_inspection_at",
        DateTime,
        &["Last Inspection", "Inspection Date"],
    ),
    FieldSpec::detail("virtual_tour_url", String, &["Virtual Tour", "Tour URL"]),
    FieldSpec::detail("crm_layout", Opaque, &["Layout"]),
    FieldSpec::detail("notes", String, &["Internal Notes"]),
    // -- raw_data only --------------------------------------------------------
    FieldSpec::raw("tag", String, &["Tags"]),
    FieldSpec::raw("approval_state", String, &[]),
    FieldSpec::raw("is_locked", Boolean, &["Locked", "Record Locked"]),
    FieldSpec::raw("record_image", String, &[]),
    FieldSpec::raw("currency", String, &[]),
    FieldSpec::raw("exchange_rate", Float, &[]),
    FieldSpec::raw("last_activity_at", DateTime, &["Last Activity Time"]),
];
