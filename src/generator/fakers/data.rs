//! Word lists the fakers draw from.

pub const FEMALE_FIRST_NAMES: &[&str] = &[
    "Olivia", "Emma", "Charlotte", "Amelia", "Sophia", "Mia", "Isabella", "Ava", "Evelyn", "Luna",
    "Harper", "Sofia", "Camila", "Eleanor", "Elizabeth", "Violet", "Scarlett", "Emily", "Hazel", "Lily",
    "Gianna", "Aurora", "Penelope", "Aria", "Nora", "Chloe", "Ellie", "Mila", "Avery", "Layla",
    "Abigail", "Ella", "Isla", "Eliana", "Nova", "Madison", "Zoe", "Ivy", "Grace", "Willow",
    "Zoey", "Hannah", "Stella", "Leah", "Naomi", "Lucy", "Riley", "Paisley", "Maya", "Audrey",
];

pub const MALE_FIRST_NAMES: &[&str] = &[
    "Liam", "Noah", "Oliver", "James", "Elijah", "Mateo", "Theodore", "Henry", "Lucas", "William",
    "Benjamin", "Levi", "Sebastian", "Jack", "Ezra", "Michael", "Daniel", "Leo", "Owen", "Samuel",
    "Hudson", "Alexander", "Asher", "Luca", "Ethan", "John", "David", "Jackson", "Joseph", "Mason",
    "Luke", "Matthew", "Julian", "Dylan", "Elias", "Jacob", "Maverick", "Gabriel", "Logan", "Aiden",
    "Thomas", "Isaac", "Miles", "Grayson", "Santiago", "Anthony", "Wyatt", "Carter", "Jayden", "Ezekiel",
];

pub const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez", "Martinez",
    "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson", "Martin",
    "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez", "Clark", "Ramirez", "Lewis", "Robinson",
    "Walker", "Young", "Allen", "King", "Wright", "Scott", "Torres", "Nguyen", "Hill", "Flores",
    "Green", "Adams", "Nelson", "Baker", "Hall", "Rivera", "Campbell", "Mitchell", "Carter", "Roberts",
];

pub const TITLES: &[&str] = &["Mr.", "Mrs.", "Ms.", "Miss", "Dr.", "Prof."];

pub const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Product Manager", "Data Analyst", "Account Executive", "Graphic Designer",
    "Marketing Coordinator", "Nurse", "Teacher", "Accountant", "Project Manager", "Sales Associate",
    "Customer Success Manager", "Operations Manager", "Financial Analyst", "HR Specialist",
    "Mechanical Engineer", "Web Developer", "Office Manager", "Consultant", "Architect",
];

pub const CITIES: &[&str] = &[
    "New York", "Los Angeles", "Chicago", "Houston", "Phoenix", "Philadelphia", "San Antonio", "San Diego",
    "Dallas", "Austin", "Jacksonville", "San Jose", "Fort Worth", "Columbus", "Charlotte", "Indianapolis",
    "San Francisco", "Seattle", "Denver", "Nashville", "Oklahoma City", "Washington", "Boston", "Portland",
    "Las Vegas", "Detroit", "Memphis", "Louisville", "Baltimore", "Milwaukee", "Albuquerque", "Tucson",
];

pub const STREET_NAMES: &[&str] = &[
    "Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Washington", "Lake", "Hill", "Park", "Sunset",
    "Highland", "Church", "Mill", "River", "Spring", "Forest", "Meadow", "Willow", "Franklin", "Lincoln",
];

pub const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Drive", "Court", "Boulevard", "Way", "Place"];

pub const STATES: &[&str] = &[
    "Alabama", "Alaska", "Arizona", "California", "Colorado", "Florida", "Georgia", "Illinois", "Indiana",
    "Massachusetts", "Michigan", "Minnesota", "New Jersey", "New York", "North Carolina", "Ohio", "Oregon",
    "Pennsylvania", "Tennessee", "Texas", "Virginia", "Washington", "Wisconsin",
];

/// Country name and ISO 3166 alpha-2 code.
pub const COUNTRIES: &[(&str, &str)] = &[
    ("United States", "US"), ("Canada", "CA"), ("Mexico", "MX"), ("Brazil", "BR"), ("Argentina", "AR"),
    ("United Kingdom", "GB"), ("Ireland", "IE"), ("France", "FR"), ("Germany", "DE"), ("Switzerland", "CH"),
    ("Austria", "AT"), ("Italy", "IT"), ("Spain", "ES"), ("Portugal", "PT"), ("Netherlands", "NL"),
    ("Belgium", "BE"), ("Sweden", "SE"), ("Norway", "NO"), ("Denmark", "DK"), ("Finland", "FI"),
    ("Poland", "PL"), ("Japan", "JP"), ("China", "CN"), ("India", "IN"), ("Australia", "AU"),
    ("New Zealand", "NZ"), ("South Africa", "ZA"), ("Egypt", "EG"), ("South Korea", "KR"), ("Singapore", "SG"),
];

pub const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "Group", "Ltd", "Corp", "and Sons", "Partners", "Holdings"];

pub const INDUSTRIES: &[&str] = &[
    "Software", "Banking", "Insurance", "Retail", "Healthcare", "Telecommunications", "Logistics",
    "Manufacturing", "Education", "Energy", "Media", "Hospitality", "Automotive", "Biotechnology",
];

pub const DEPARTMENTS: &[&str] = &[
    "Engineering", "Sales", "Marketing", "Finance", "Human Resources", "Legal", "Support", "Operations",
    "Research", "Purchasing",
];

/// ISO 4217 code, name and symbol.
pub const CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "US Dollar", "$"), ("EUR", "Euro", "€"), ("GBP", "Pound Sterling", "£"), ("JPY", "Yen", "¥"),
    ("CHF", "Swiss Franc", "CHF"), ("CAD", "Canadian Dollar", "$"), ("AUD", "Australian Dollar", "$"),
    ("CNY", "Yuan Renminbi", "¥"), ("SEK", "Swedish Krona", "kr"), ("NOK", "Norwegian Krone", "kr"),
    ("DKK", "Danish Krone", "kr"), ("INR", "Indian Rupee", "₹"), ("BRL", "Brazilian Real", "R$"),
    ("MXN", "Mexican Peso", "$"), ("ZAR", "Rand", "R"), ("KRW", "Won", "₩"), ("SGD", "Singapore Dollar", "$"),
];

pub const CARD_BRANDS: &[(&str, &str, usize)] = &[
    ("Visa", "4", 16), ("Mastercard", "51", 16), ("American Express", "37", 15), ("Discover", "6011", 16),
];

pub const COLORS: &[(&str, &str)] = &[
    ("red", "#ff0000"), ("green", "#008000"), ("blue", "#0000ff"), ("yellow", "#ffff00"),
    ("orange", "#ffa500"), ("purple", "#800080"), ("pink", "#ffc0cb"), ("brown", "#a52a2a"),
    ("black", "#000000"), ("white", "#ffffff"), ("gray", "#808080"), ("cyan", "#00ffff"),
    ("magenta", "#ff00ff"), ("teal", "#008080"), ("navy", "#000080"), ("olive", "#808000"),
    ("maroon", "#800000"), ("lime", "#00ff00"), ("silver", "#c0c0c0"), ("gold", "#ffd700"),
];

/// Language name and ISO 639-1 code.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("English", "en"), ("German", "de"), ("French", "fr"), ("Spanish", "es"), ("Italian", "it"),
    ("Portuguese", "pt"), ("Dutch", "nl"), ("Swedish", "sv"), ("Polish", "pl"), ("Russian", "ru"),
    ("Chinese", "zh"), ("Japanese", "ja"), ("Korean", "ko"), ("Hindi", "hi"), ("Arabic", "ar"),
    ("Turkish", "tr"), ("Greek", "el"), ("Finnish", "fi"), ("Danish", "da"), ("Norwegian", "no"),
];

pub const PET_NAMES: &[&str] = &[
    "Bella", "Luna", "Charlie", "Lucy", "Max", "Bailey", "Cooper", "Daisy", "Milo", "Oliver", "Rocky",
    "Buddy", "Coco", "Teddy", "Simba", "Nala", "Loki", "Pepper", "Ginger", "Shadow",
];

pub const PET_CATEGORIES: &[&str] = &["dog", "cat", "bird", "fish", "rabbit", "hamster", "turtle", "horse", "guinea pig"];

pub const BREEDS: &[&str] = &[
    "Labrador Retriever", "German Shepherd", "Golden Retriever", "Bulldog", "Poodle", "Beagle",
    "Persian", "Maine Coon", "Siamese", "Ragdoll", "Bengal", "Sphynx",
];

pub const PRODUCT_ADJECTIVES: &[&str] = &[
    "Ergonomic", "Rustic", "Sleek", "Handcrafted", "Practical", "Refined", "Gorgeous", "Incredible",
    "Fantastic", "Intelligent", "Licensed", "Small", "Generic", "Tasty", "Awesome",
];

pub const PRODUCT_MATERIALS: &[&str] = &[
    "Steel", "Wooden", "Concrete", "Plastic", "Cotton", "Granite", "Rubber", "Metal", "Soft", "Fresh",
    "Frozen", "Bronze", "Leather",
];

pub const PRODUCTS: &[&str] = &[
    "Chair", "Car", "Computer", "Keyboard", "Mouse", "Bike", "Ball", "Gloves", "Pants", "Shirt", "Table",
    "Shoes", "Hat", "Towels", "Soap", "Tuna", "Chicken", "Fish", "Cheese", "Bacon", "Pizza", "Salad",
    "Sausages", "Chips", "Lamp", "Backpack", "Watch",
];

pub const PRODUCT_CATEGORIES: &[&str] = &[
    "Books", "Movies", "Music", "Games", "Electronics", "Computers", "Home", "Garden", "Tools", "Grocery",
    "Health", "Beauty", "Toys", "Kids", "Baby", "Clothing", "Shoes", "Jewelery", "Sports", "Outdoors",
    "Automotive", "Industrial",
];

/// File extension and media type.
pub const FILE_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"), ("json", "application/json"), ("xml", "application/xml"),
    ("zip", "application/zip"), ("txt", "text/plain"), ("csv", "text/csv"), ("html", "text/html"),
    ("png", "image/png"), ("jpg", "image/jpeg"), ("gif", "image/gif"), ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"), ("mp4", "video/mp4"), ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
];

pub const ERRORS: &[&str] = &[
    "connection refused", "connection reset by peer", "request timed out", "resource not found",
    "permission denied", "invalid argument", "internal server error", "service unavailable",
    "too many requests", "unauthorized", "bad gateway", "conflict with current state of the resource",
    "payload too large", "unsupported media type", "disk quota exceeded",
];

pub const TLDS: &[&str] = &["com", "net", "org", "io", "dev", "info", "biz", "co"];

pub const EMAIL_DOMAINS: &[&str] = &["gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "example.com", "mail.com"];

pub const BEERS: &[&str] = &[
    "Pliny The Elder", "Founders Kentucky Breakfast", "Trappistes Rochefort 10", "Duvel",
    "Weihenstephaner Hefeweissbier", "Two Hearted Ale", "Sierra Nevada Bigfoot", "Ten FIDY",
    "La Fin Du Monde", "Westvleteren 12", "Orval Trappist Ale", "Hopslam Ale",
];

pub const BEER_STYLES: &[&str] = &[
    "Light Lager", "Pilsner", "European Amber Lager", "Dark Lager", "Bock", "Light Hybrid Beer",
    "Amber Hybrid Beer", "English Pale Ale", "Scottish And Irish Ale", "India Pale Ale", "Stout",
    "Belgian Strong Ale", "Strong Ale", "Fruit Beer",
];

pub const WEEKDAYS: &[&str] = &["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

pub const MONTHS: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

/// Candidates for generated property names.
pub const NOUNS: &[&str] = &[
    "account", "address", "amount", "answer", "area", "balance", "band", "bank", "bit", "block", "body",
    "book", "box", "branch", "case", "cell", "channel", "chart", "city", "class", "code", "color", "comment",
    "data", "date", "deal", "device", "entry", "event", "field", "file", "flag", "form", "group", "item",
    "key", "label", "level", "line", "link", "list", "mode", "note", "number", "order", "owner", "page",
    "part", "plan", "point", "price", "record", "region", "result", "role", "rule", "score", "source",
    "state", "status", "step", "tag", "task", "term", "title", "topic", "type", "unit", "user", "value",
    "version", "view", "zone",
];

pub const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do", "eiusmod",
    "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim", "ad", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip", "ex", "ea",
    "commodo", "consequat", "duis", "aute", "irure", "in", "reprehenderit", "voluptate", "velit", "esse",
    "cillum", "fugiat", "nulla", "pariatur",
];
