use crate::field_dictionary::FieldSpec;
use crate::field_dictionary::ValueType::{
    Boolean, DateTime, Float, Integer, Json, Opaque, String, StringArray,
};

/// Canonical fields for the `buildings` / `building_details` tables.
pub const BUILDING_FIELDS: &[FieldSpec] = &[
    // -- buildings ------------------------------------------------------------
    FieldSpec::primary(
        "external_id",
        String,
        &["Record Id", "id", "Building ID", "Zoho ID", "CRM ID"],
    )
    .identifier(),
    FieldSpec::primary("name", String, &["Building Name"]),
    FieldSpec::primary("property_type", String, &["Property Type", "Building Type", "Type"]),
    FieldSpec::primary("status", String, &["Building Status"]),
    FieldSpec::primary(
        "address",
        String,
        &["Street", "Street Address", "Address Line 1"],
    ),
    FieldSpec::primary("city", String, &[]),
    FieldSpec::primary("state", String, &["Province", "Region"]),
    FieldSpec::primary("zip_code", String, &["Zip", "Postal Code", "Postcode"]),
    FieldSpec::primary("country", String, &[]),
    FieldSpec::primary("neighborhood", String, &["Neighbourhood", "Area"]),
    FieldSpec::primary("total_units", Integer, &["Units", "Number of Units"]),
    FieldSpec::primary("year_built", Integer, &[]),
    FieldSpec::primary("manager", Json, &["Building Manager", "Property Manager"]),
    FieldSpec::primary("owner", Json, &["Building Owner", "Record Owner"]),
    FieldSpec::primary("created_by", Json, &[]),
    FieldSpec::primary("crm_created_at", DateTime, &["Created Time", "Created Date"]),
    FieldSpec::primary("crm_modified_at", DateTime, &["Modified Time", "Last Modified"]),
    // -- building_details -----------------------------------------------------
    FieldSpec::detail("description", String, &["Building Description"]),
    FieldSpec::detail("floors", Integer, &["Number of Floors", "Stories"]),
    FieldSpec::detail("has_elevator", Boolean, &["Elevator"]),
    FieldSpec::detail("has_doorman", Boolean, &["Doorman", "Concierge"]),
    FieldSpec::detail("has_gym", Boolean, &["Gym", "Fitness Center"]),
    FieldSpec::detail("has_pool", Boolean, &["Pool"]),
    FieldSpec::detail("has_rooftop", Boolean, &["Rooftop", "Roof Deck"]),
    FieldSpec::detail("has_bike_storage", Boolean, &["Bike Storage"]),
    FieldSpec::detail("has_package_room", Boolean, &["Package Room"]),
    FieldSpec::detail("has_storage", Boolean, &["Storage"]),
    FieldSpec::detail(
        "is_wheelchair_accessible",
        Boolean,
        &["Wheelchair Accessible", "Accessible"],
    ),
    FieldSpec::detail("amenities", StringArray, &["Features"]),
    FieldSpec::detail("parking_types", StringArray, &["Parking"]),
    FieldSpec::detail("pet_policy", String, &["Pets"]),
    FieldSpec::detail("laundry", String, &[]),
    FieldSpec::detail("latitude", Float, &["Lat"]),
    FieldSpec::detail("longitude", Float, &["Lng", "Long"]),
    FieldSpec::detail(
        "last_renovated_at",
        DateTime,
        &["Last Renovated", "Renovation Date"],
    ),
    FieldSpec::detail("territory", Json, &["Territories"]),
    FieldSpec::detail("website", String, &["URL"]),
    FieldSpec::detail("phone", String, &["Building Phone"]),
    FieldSpec::detail("photo_urls", StringArray, &["Photos", "Images"]),
    FieldSpec::detail("crm_layout", Opaque, &["Layout"]),
    FieldSpec::detail("notes", String, &["Internal Notes"]),
    // -- raw_data only --------------------------------------------------------
    FieldSpec::raw("tag", String, &["Tags"]),
    FieldSpec::raw("approval_state", String, &[]),
    FieldSpec::raw("is_locked", Boolean, &["Locked", "Record Locked"]),
    FieldSpec::raw("record_image", String, &[]),
    FieldSpec::raw("last_activity_at", DateTime, &["Last Activity Time"]),
];
