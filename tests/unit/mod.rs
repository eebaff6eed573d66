mod merge_properties;
mod statistics_reference;
